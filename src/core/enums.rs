//! Small schema-level enums.

use serde::{Deserialize, Serialize};

/// Whether an attribute may carry time samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Variability {
    /// May be animated.
    #[default]
    Varying,
    /// Single value for all time; always authored at the default time.
    Uniform,
}

/// Stage up axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UpAxis {
    Y,
    #[default]
    Z,
}

/// How a prim is authored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Specifier {
    #[default]
    Def,
    Over,
}
