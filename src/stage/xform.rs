//! Xform op composition for fused transform reads.

use glam::{DMat4, DQuat, DVec3};

use crate::core::Value;
use crate::util::{Error, Result, Token};

/// Attribute listing a prim's xform ops in application order.
pub const XFORM_OP_ORDER: &str = "xformOpOrder";

const INVERT_PREFIX: &str = "!invert!";

/// Compose ordered xform ops into a local transform.
///
/// Each entry is the op name from `xformOpOrder` (optionally prefixed with
/// `!invert!`) and its resolved value. Ops listed first are outermost, so the
/// result is `op0 * op1 * ... * opN` in column-vector convention.
/// Ops with no authored value contribute identity.
pub fn compose_xform_ops(ops: &[(Token, Option<Value>)]) -> Result<DMat4> {
    let mut result = DMat4::IDENTITY;
    for (op, value) in ops {
        let (invert, name) = match op.strip_prefix(INVERT_PREFIX) {
            Some(name) => (true, name),
            None => (false, op.as_str()),
        };
        let Some(value) = value else {
            continue;
        };
        let mut m = op_matrix(name, value)?;
        if invert {
            m = m.inverse();
        }
        result *= m;
    }
    Ok(result)
}

fn op_matrix(name: &str, value: &Value) -> Result<DMat4> {
    // xformOp:<type>[:<suffix>]
    let op_type = name
        .strip_prefix("xformOp:")
        .and_then(|rest| rest.split(':').next())
        .ok_or_else(|| Error::schema(format!("not an xform op: {name}")))?;

    let m = match op_type {
        "translate" => DMat4::from_translation(as_dvec3(name, value)?),
        "scale" => DMat4::from_scale(as_dvec3(name, value)?),
        "rotateX" => DMat4::from_rotation_x(as_scalar(name, value)?.to_radians()),
        "rotateY" => DMat4::from_rotation_y(as_scalar(name, value)?.to_radians()),
        "rotateZ" => DMat4::from_rotation_z(as_scalar(name, value)?.to_radians()),
        "rotateXYZ" => {
            let r = as_dvec3(name, value)?;
            DMat4::from_rotation_z(r.z.to_radians())
                * DMat4::from_rotation_y(r.y.to_radians())
                * DMat4::from_rotation_x(r.x.to_radians())
        }
        "rotateZYX" => {
            let r = as_dvec3(name, value)?;
            DMat4::from_rotation_x(r.x.to_radians())
                * DMat4::from_rotation_y(r.y.to_radians())
                * DMat4::from_rotation_z(r.z.to_radians())
        }
        "orient" => match value {
            Value::Quatf(q) => DMat4::from_quat(DQuat::from_xyzw(q.x as f64, q.y as f64, q.z as f64, q.w as f64)),
            Value::Quatd(q) => DMat4::from_quat(*q),
            other => return Err(bad_op(name, other)),
        },
        "transform" => match value {
            Value::Matrix4d(m) => *m,
            other => return Err(bad_op(name, other)),
        },
        other => return Err(Error::Unsupported(format!("xform op type {other}"))),
    };
    Ok(m)
}

fn as_dvec3(name: &str, value: &Value) -> Result<DVec3> {
    match value {
        Value::Double3(v) => Ok(*v),
        Value::Float3(v) => Ok(v.as_dvec3()),
        other => Err(bad_op(name, other)),
    }
}

fn as_scalar(name: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Double(v) => Ok(*v),
        Value::Float(v) => Ok(*v as f64),
        other => Err(bad_op(name, other)),
    }
}

fn bad_op(name: &str, value: &Value) -> Error {
    Error::type_mismatch(format!("value for {name}"), format!("{:?}", value.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_trs_order() {
        let ops = vec![
            (Token::new("xformOp:translate"), Some(Value::Double3(DVec3::new(1.0, 2.0, 3.0)))),
            (Token::new("xformOp:rotateXYZ"), Some(Value::Float3(Vec3::new(0.0, 0.0, 90.0)))),
            (Token::new("xformOp:scale"), Some(Value::Float3(Vec3::splat(2.0)))),
        ];
        let m = compose_xform_ops(&ops).expect("Failed to compose");
        let p = m.transform_point3(DVec3::X);
        // scale -> (2,0,0), rotate 90 about Z -> (0,2,0), translate -> (1,4,3)
        assert!((p - DVec3::new(1.0, 4.0, 3.0)).length() < 1e-9);
    }

    #[test]
    fn test_invert_and_missing() {
        let ops = vec![
            (Token::new("!invert!xformOp:translate:pivot"), Some(Value::Double3(DVec3::ONE))),
            (Token::new("xformOp:scale"), None),
        ];
        let m = compose_xform_ops(&ops).expect("Failed to compose");
        assert!((m.transform_point3(DVec3::ZERO) - DVec3::splat(-1.0)).length() < 1e-12);
    }

    #[test]
    fn test_bad_op() {
        let ops = vec![(Token::new("xformOp:translate"), Some(Value::Int(1)))];
        assert!(compose_xform_ops(&ops).is_err());
    }
}
