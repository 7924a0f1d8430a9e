//! Integration tests for writing samples to a stage and reading them back.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use usd_io::core::{TimeCode, Value, ValueTypeName, Variability};
use usd_io::prelude::*;
use usd_io::serialization::{BinderConfig, SOURCE_MEMBER_KEY};

usd_io::usd_enum! {
    #[derive(Default)]
    pub enum Shading {
        #[default]
        Flat,
        Smooth,
        FaceVarying,
    }
}

#[derive(Default, Debug, PartialEq)]
struct Intrinsics {
    flag: bool,
    count: i32,
    big: u64,
    size: f64,
    scale: f32,
    label: String,
    kind: Token,
    offset: Vec3,
    points: Vec<Vec3>,
    widths: Box<[f32]>,
    names: Vec<String>,
    shading: Shading,
    maybe: Option<f32>,
}

impl Sample for Intrinsics {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.schema_name("Gauge");
        s.field("flag", |v| &v.flag, |v| &mut v.flag);
        s.field("count", |v| &v.count, |v| &mut v.count);
        s.field("big", |v| &v.big, |v| &mut v.big);
        s.field("size", |v| &v.size, |v| &mut v.size);
        s.field("scale", |v| &v.scale, |v| &mut v.scale);
        s.field("label", |v| &v.label, |v| &mut v.label);
        s.field("kind", |v| &v.kind, |v| &mut v.kind);
        s.field("offset", |v| &v.offset, |v| &mut v.offset);
        s.field("points", |v| &v.points, |v| &mut v.points);
        s.field("widths", |v| &v.widths, |v| &mut v.widths);
        s.field("names", |v| &v.names, |v| &mut v.names);
        s.field("shading", |v| &v.shading, |v| &mut v.shading);
        s.field("maybe", |v| &v.maybe, |v| &mut v.maybe);
    }
}

fn gauge() -> Intrinsics {
    Intrinsics {
        flag: true,
        count: -7,
        big: 1 << 40,
        size: 2.5,
        scale: 0.25,
        label: "hello".into(),
        kind: Token::new("render"),
        offset: Vec3::new(1.0, 2.0, 3.0),
        points: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        widths: vec![0.1, 0.2].into_boxed_slice(),
        names: vec!["a".into(), "b".into()],
        shading: Shading::FaceVarying,
        maybe: None,
    }
}

fn path(p: &str) -> SdfPath {
    SdfPath::new(p).expect("Failed to parse path")
}

#[test]
fn test_roundtrip_intrinsics() {
    let scene = Scene::create();
    let prim = path("/World/Gauge");
    let written = gauge();
    scene.write(&prim, &written).expect("Failed to write sample");

    let mut read = Intrinsics::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read, written);
}

#[test]
fn test_wire_shapes() {
    let scene = Scene::create();
    let prim = path("/World/Gauge");
    scene.write(&prim, &gauge()).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        let names = stage.get_attribute(&prim, "names").expect("Failed to find names");
        assert_eq!(stage.attribute_type_name(&names), Some(ValueTypeName::TOKEN_ARRAY));

        let shading = stage.get_attribute(&prim, "shading").expect("Failed to find shading");
        assert_eq!(
            stage.get_value(&shading, TimeCode::Default).expect("Failed to get value"),
            Some(Value::Token(Token::new("faceVarying")))
        );

        // Null optionals are not authored.
        assert!(stage.get_attribute(&prim, "maybe").is_none());
        assert_eq!(stage.prim_type_name(&prim).as_deref(), Some("Gauge"));
    });
}

#[test]
fn test_unknown_enum_token() {
    let scene = Scene::create();
    let prim = path("/World/Gauge");
    scene.write(&prim, &gauge()).expect("Failed to write sample");

    scene
        .io()
        .with_stage(|stage| {
            let attr = stage.get_attribute(&prim, "shading")?;
            stage.set_value(&attr, Value::Token(Token::new("glossy")), TimeCode::Default).ok()
        })
        .expect("Failed to author bad token");

    let mut read = Intrinsics::default();
    let err = scene.read(&prim, &mut read).expect_err("Bad token should fail");
    assert!(matches!(err, Error::SchemaMismatch(_)), "unexpected error: {err}");
}

#[test]
fn test_time_samples() {
    let scene = Scene::create();
    let prim = path("/World/Gauge");
    for frame in 1..=3 {
        scene.set_time(frame as f64);
        let sample = Intrinsics { size: frame as f64, ..gauge() };
        scene.write(&prim, &sample).expect("Failed to write sample");
    }

    scene.set_time(2.0);
    let mut read = Intrinsics::default();
    scene.read(&prim, &mut read).expect("Failed to read sample");
    assert_eq!(read.size, 2.0);

    // Linear interpolation between samples.
    scene.set_time(2.5);
    scene.read(&prim, &mut read).expect("Failed to read sample");
    assert!((read.size - 2.5).abs() < 1e-9);

    let keys = scene.compute_key_frames(&path("/World"), "size").expect("Failed to compute key frames");
    assert_eq!(keys.get(&prim), Some(&vec![1.0, 2.0, 3.0]));
    // Repeated values are elided by the sparse writer.
    assert!(scene.io().elided_samples() > 0);
}

// ============================================================================
// Annotations
// ============================================================================

#[derive(Default, Debug)]
struct Annotated {
    radius: f64,
    purpose: Token,
    texture: String,
    points: Vec<Vec3>,
    color: Vec<Vec3>,
    scratch: f32,
    origin: Vec3,
}

impl Sample for Annotated {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.schema_name("Sphere");
        s.field("radius", |v| &v.radius, |v| &mut v.radius).uniform();
        s.field("purpose", |v| &v.purpose, |v| &mut v.purpose).metadata();
        s.field("texture", |v| &v.texture, |v| &mut v.texture).asset_path();
        s.field("points", |v| &v.points, |v| &mut v.points).vertex_data(3);
        s.field("color", |v| &v.color, |v| &mut v.color).namespace("look");
        s.field("scratch", |v| &v.scratch, |v| &mut v.scratch).non_serialized();
        s.field("origin", |v| &v.origin, |v| &mut v.origin).custom_data();
    }
}

#[test]
fn test_annotations() {
    let scene = Scene::create();
    let prim = path("/World/Ball");
    scene.set_time(4.0);
    let written = Annotated {
        radius: 3.0,
        purpose: Token::new("proxy"),
        texture: "./tex/ball.png".into(),
        points: vec![Vec3::ONE; 6],
        color: vec![Vec3::X],
        scratch: 9.0,
        origin: Vec3::new(0.0, 1.0, 0.0),
    };
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        let radius = stage.get_attribute(&prim, "radius").expect("Failed to find radius");
        assert_eq!(stage.attribute_variability(&radius), Variability::Uniform);
        assert!(stage.time_samples(&radius).is_empty());

        assert_eq!(stage.get_metadata(&prim, "purpose"), Some(Value::Token(Token::new("proxy"))));
        assert!(stage.get_attribute(&prim, "purpose").is_none());
        assert_eq!(stage.get_custom_data(&prim, "origin"), Some(Value::Float3(Vec3::new(0.0, 1.0, 0.0))));

        let texture = stage.get_attribute(&prim, "texture").expect("Failed to find texture");
        assert_eq!(stage.attribute_type_name(&texture), Some(ValueTypeName::ASSET));

        let points = stage.get_attribute(&prim, "primvars:points").expect("Failed to find points primvar");
        assert_eq!(stage.get_element_size(&points), 3);

        assert!(stage.get_attribute(&prim, "look:color").is_some());
        assert!(stage.get_attribute(&prim, "scratch").is_none());
    });

    let mut read = Annotated { scratch: -1.0, ..Default::default() };
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.radius, 3.0);
    assert_eq!(read.purpose.as_str(), "proxy");
    assert_eq!(read.texture, "./tex/ball.png");
    assert_eq!(read.points.len(), 6);
    assert_eq!(read.color, vec![Vec3::X]);
    assert_eq!(read.origin, Vec3::new(0.0, 1.0, 0.0));
    assert_eq!(read.scratch, -1.0);
}

// ============================================================================
// Primvars, connectables, relationships
// ============================================================================

#[derive(Default)]
struct Ids {
    ids: Primvar<Vec<i32>>,
    empty: Primvar<Vec<f32>>,
}

impl Sample for Ids {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.primvar("ids", |v| &v.ids, |v| &mut v.ids);
        s.primvar("empty", |v| &v.empty, |v| &mut v.empty);
    }
}

#[test]
fn test_primvar_extras() {
    let scene = Scene::create();
    let prim = path("/World/Mesh");
    let written = Ids {
        ids: Primvar::new(vec![1, 2, 3, 4, 5, 6, 7, 8])
            .with_element_size(4)
            .with_interpolation(PrimvarInterpolation::Vertex)
            .with_indices(vec![0, 1, 2, 3]),
        empty: Primvar::default(),
    };
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        assert!(stage.get_attribute(&prim, "primvars:ids").is_some());
        assert!(stage.get_attribute(&prim, "primvars:ids:indices").is_some());
        assert!(stage.get_attribute(&prim, "primvars:empty").is_none());
    });

    let mut read = Ids::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.ids.value.as_deref(), Some(&[1, 2, 3, 4, 5, 6, 7, 8][..]));
    assert_eq!(read.ids.element_size, 4);
    assert_eq!(read.ids.interpolation, PrimvarInterpolation::Vertex);
    assert_eq!(read.ids.indices, Some(vec![0, 1, 2, 3]));
    assert!(read.empty.value.is_none());
}

#[derive(Default)]
struct Shader {
    roughness: Connectable<f32>,
    metallic: Connectable<f32>,
}

impl Sample for Shader {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.schema_name("Shader");
        s.connectable("roughness", |v| &v.roughness, |v| &mut v.roughness).namespace("inputs");
        s.connectable("metallic", |v| &v.metallic, |v| &mut v.metallic).namespace("inputs");
    }
}

#[test]
fn test_connectable() {
    let scene = Scene::create();
    let prim = path("/Looks/Mat/Surface");
    let mut written = Shader { roughness: Connectable::new(5.0), metallic: Connectable::new(0.5) };
    written.roughness.connect_output(&path("/Looks/Mat/Tex"), "r");
    scene.write(&prim, &written).expect("Failed to write sample");

    let mut read = Shader::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.roughness.default_value, 5.0);
    assert!(read.roughness.is_connected());
    assert_eq!(read.roughness.connected_path.as_deref(), Some("/Looks/Mat/Tex.outputs:r"));
    assert_eq!(read.metallic.default_value, 0.5);
    assert!(!read.metallic.is_connected());
    assert!(read.metallic.connected_path.is_none());

    // An empty path clears the connection.
    written.roughness.connected_path = Some(String::new());
    scene.write(&prim, &written).expect("Failed to rewrite sample");
    let mut cleared = Shader::default();
    scene.read(&prim, &mut cleared).expect("Failed to read sample");
    assert!(!cleared.roughness.is_connected());
}

#[derive(Default)]
struct Bound {
    material: Relationship,
    proxy: Option<String>,
    unset: Relationship,
}

impl Sample for Bound {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.relationship("binding", |v| &v.material, |v| &mut v.material).namespace("material");
        s.field("proxyPrim", |v| &v.proxy, |v| &mut v.proxy).relationship();
        s.relationship("unset", |v| &v.unset, |v| &mut v.unset);
    }
}

#[test]
fn test_relationships() {
    let scene = Scene::create();
    let prim = path("/World/Cube");
    let written = Bound {
        material: Relationship::single("/Looks/Red"),
        proxy: Some("/World/CubeProxy".into()),
        unset: Relationship::default(),
    };
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        let rel = stage.get_relationship(&prim, "material:binding").expect("Failed to find relationship");
        assert_eq!(stage.get_targets(&rel), vec![path("/Looks/Red")]);
        assert!(stage.get_relationship(&prim, "unset").is_none());
    });

    let mut read = Bound::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.material.get_only_target().expect("Failed to get target"), "/Looks/Red");
    assert_eq!(read.proxy.as_deref(), Some("/World/CubeProxy"));
    assert!(read.unset.target_paths.is_none());
    assert!(read.unset.get_only_target().is_err());
}

// ============================================================================
// Dictionaries
// ============================================================================

#[derive(Default)]
struct Weighted {
    weights: HashMap<String, f32>,
    uvs: HashMap<String, Primvar<Vec<Vec2>>>,
}

impl Sample for Weighted {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.dictionary("weights", |v| &v.weights, |v| &mut v.weights);
        s.dictionary("uvs", |v| &v.uvs, |v| &mut v.uvs);
    }
}

#[test]
fn test_dictionary_unrolling() {
    let scene = Scene::create();
    let prim = path("/World/Skin");
    let mut written = Weighted::default();
    written.weights.insert("hip".into(), 0.5);
    written.weights.insert("knee".into(), 0.25);
    written.weights.insert("ankle".into(), 0.25);
    written.uvs.insert(
        "st".into(),
        Primvar::new(vec![Vec2::ZERO, Vec2::ONE])
            .with_interpolation(PrimvarInterpolation::FaceVarying)
            .with_indices(vec![0, 1, 1, 0]),
    );
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        for key in ["hip", "knee", "ankle"] {
            let attr = stage
                .get_attribute(&prim, &format!("weights:{key}"))
                .expect("Failed to find dictionary entry");
            assert_eq!(
                stage.get_attribute_custom_data(&attr, SOURCE_MEMBER_KEY),
                Some(Value::String("weights".into()))
            );
        }
        assert!(stage.get_attribute(&prim, "primvars:uvs:st").is_some());
        assert!(stage.get_attribute(&prim, "primvars:uvs:st:indices").is_some());
    });

    let mut read = Weighted::default();
    read.weights.insert("stale".into(), 1.0);
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.weights.len(), 3);
    assert_eq!(read.weights.get("hip"), Some(&0.5));
    assert!(!read.weights.contains_key("stale"));

    assert_eq!(read.uvs.len(), 1);
    let st = read.uvs.get("st").expect("Failed to find st");
    assert_eq!(st.interpolation, PrimvarInterpolation::FaceVarying);
    assert_eq!(st.indices, Some(vec![0, 1, 1, 0]));
}

#[derive(Default)]
struct Flat {
    flat: BTreeMap<String, i32>,
}

impl Sample for Flat {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.dictionary("flat", |v| &v.flat, |v| &mut v.flat).force_no_namespace();
    }
}

#[test]
fn test_dictionary_without_namespace() {
    let scene = Scene::create();
    let prim = path("/World/Flat");
    let mut written = Flat::default();
    written.flat.insert("lod".into(), 2);
    written.flat.insert("level".into(), 7);
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        assert!(stage.get_attribute(&prim, "lod").is_some());
        assert!(stage.get_attribute(&prim, "flat:lod").is_none());
    });

    let mut read = Flat::default();
    scene.read(&prim, &mut read).expect("Failed to read sample");
    assert_eq!(read.flat, written.flat);
}

#[derive(Default)]
struct Rigged {
    weights: BTreeMap<String, f32>,
    bind: Relationship,
}

impl Sample for Rigged {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.dictionary("weights", |v| &v.weights, |v| &mut v.weights);
        s.relationship("bind", |v| &v.bind, |v| &mut v.bind).namespace("weights");
    }
}

#[test]
fn test_dictionary_ignores_relationships() {
    let scene = Scene::create();
    let prim = path("/World/Rigged");
    let mut written = Rigged::default();
    written.weights.insert("hip".into(), 0.5);
    written.bind = Relationship::single("/World/Rig");
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        assert!(stage.get_attribute(&prim, "weights:hip").is_some());
        assert!(stage.get_relationship(&prim, "weights:bind").is_some());
    });

    let mut read = Rigged::default();
    scene.read(&prim, &mut read).expect("Failed to read sample");
    assert_eq!(read.weights.len(), 1);
    assert_eq!(read.weights.get("hip"), Some(&0.5));
    assert!(!read.weights.contains_key("bind"));
    assert_eq!(read.bind.get_only_target().expect("Failed to get target"), "/World/Rig");
}

// ============================================================================
// Nested and dynamic members
// ============================================================================

#[derive(Default, Debug, PartialEq)]
struct Light {
    intensity: f32,
    exposure: f32,
}

impl Sample for Light {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("intensity", |v| &v.intensity, |v| &mut v.intensity);
        s.field("exposure", |v| &v.exposure, |v| &mut v.exposure);
    }
}

#[derive(Default)]
struct Rig {
    key: Light,
    orphan: Light,
    extra: Dynamic,
    fill: Dynamic,
}

impl Sample for Rig {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.nested("key", |v| &v.key, |v| &mut v.key).namespace("key");
        s.nested("orphan", |v| &v.orphan, |v| &mut v.orphan);
        s.field("extra", |v| &v.extra, |v| &mut v.extra);
        s.field("fill", |v| &v.fill, |v| &mut v.fill).namespace("fill");
    }
}

#[test]
fn test_nested_and_dynamic() {
    let scene = Scene::create();
    let prim = path("/World/Rig");
    let written = Rig {
        key: Light { intensity: 10.0, exposure: 1.0 },
        orphan: Light { intensity: 3.0, exposure: 0.0 },
        extra: Dynamic::new(vec![1.0f32, 2.0]),
        fill: Dynamic::sample(Light { intensity: 2.0, exposure: -1.0 }),
    };
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        assert!(stage.get_attribute(&prim, "key:intensity").is_some());
        assert!(stage.get_attribute(&prim, "fill:exposure").is_some());
        // No namespace, nothing written.
        assert!(stage.get_attribute(&prim, "intensity").is_none());
    });

    let mut read = Rig { fill: Dynamic::sample(Light::default()), ..Default::default() };
    // The orphan cannot be represented, so the read reports false.
    assert!(!scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.key, Light { intensity: 10.0, exposure: 1.0 });
    assert_eq!(read.orphan, Light::default());
    assert_eq!(read.extra.get::<Vec<f32>>(), Some(&vec![1.0, 2.0]));
    assert_eq!(read.fill.get::<Light>(), Some(&Light { intensity: 2.0, exposure: -1.0 }));
}

#[derive(Default)]
struct Loose {
    value: Dynamic,
}

impl Sample for Loose {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("value", |v| &v.value, |v| &mut v.value);
    }
}

#[test]
fn test_reverse_binding_is_lossy() {
    let scene = Scene::create();
    let prim = path("/World/Loose");
    let widths: Box<[f32]> = vec![0.5, 0.75].into_boxed_slice();
    scene.write(&prim, &Loose { value: Dynamic::new(widths) }).expect("Failed to write sample");

    let mut read = Loose::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    // float[] comes back as the first host type registered for it.
    assert!(read.value.get::<Box<[f32]>>().is_none());
    assert_eq!(read.value.get::<Vec<f32>>(), Some(&vec![0.5, 0.75]));

    // Role types resolve through their storage type.
    scene
        .io()
        .with_stage(|stage| {
            let attr = stage.create_attribute(
                &prim,
                &Token::new("value"),
                ValueTypeName::COLOR3F_ARRAY,
                Variability::Varying,
            )?;
            stage.set_value(&attr, Value::Float3Array(vec![Vec3::X]), TimeCode::Default)
        })
        .expect("Failed to author color");
    let mut color = Loose::default();
    scene.read(&prim, &mut color).expect("Failed to read sample");
    assert_eq!(color.value.get::<Vec<Vec3>>(), Some(&vec![Vec3::X]));
}

#[derive(Default)]
struct ErasedMeta {
    note: Dynamic,
}

impl Sample for ErasedMeta {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("note", |v| &v.note, |v| &mut v.note).metadata();
    }
}

#[test]
fn test_erased_metadata_rejected() {
    let scene = Scene::create();
    let prim = path("/World/Meta");
    let err = scene
        .write(&prim, &ErasedMeta { note: Dynamic::new(1.0f32) })
        .expect_err("Type-erased metadata should fail");
    assert!(matches!(err, Error::SchemaMismatch(_)));

    scene
        .io()
        .with_stage(|stage| stage.set_metadata(&prim, "note", Value::Float(1.0)))
        .expect("Failed to author metadata");
    let mut read = ErasedMeta::default();
    assert!(!scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert!(read.note.is_none());
}

// ============================================================================
// Properties and fused members
// ============================================================================

#[derive(Default)]
struct Rect {
    width: f32,
    height: f32,
}

impl Sample for Rect {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("width", |v| &v.width, |v| &mut v.width);
        s.property("height", |v| v.height, |v, h| v.height = h);
    }
}

#[test]
fn test_property_members() {
    let scene = Scene::create();
    let prim = path("/World/Rect");
    scene.write(&prim, &Rect { width: 2.0, height: 3.0 }).expect("Failed to write sample");

    let mut read = Rect::default();
    scene.read(&prim, &mut read).expect("Failed to read sample");
    assert_eq!(read.width, 2.0);
    assert_eq!(read.height, 3.0);

    // Properties come first in schema order.
    let schema = scene.context().reflect().get_schema_of::<Rect>().expect("Failed to get schema");
    assert_eq!(schema.member_index("height"), Some(0));
}

#[derive(Default)]
struct Painted {
    color: Vec<Vec4>,
    transform: DMat4,
}

impl Sample for Painted {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.schema_name("Mesh");
        s.field("displayColor", |v| &v.color, |v| &mut v.color).fused_display_color();
        s.field("transform", |v| &v.transform, |v| &mut v.transform).namespace("xformOp").fused_transform();
    }
}

#[test]
fn test_fused_members() {
    let scene = Scene::create();
    let prim = path("/World/Painted");
    let transform = DMat4::from_translation(glam::DVec3::new(1.0, 2.0, 3.0));
    let written = Painted { color: vec![Vec4::new(1.0, 0.0, 0.0, 0.5)], transform };
    scene.write(&prim, &written).expect("Failed to write sample");

    scene.io().with_stage(|stage| {
        let color = stage.get_attribute(&prim, "primvars:displayColor").expect("Failed to find displayColor");
        assert_eq!(
            stage.get_value(&color, TimeCode::Default).expect("Failed to get value"),
            Some(Value::Float3Array(vec![Vec3::X]))
        );
        let opacity = stage.get_attribute(&prim, "primvars:displayOpacity").expect("Failed to find opacity");
        assert_eq!(
            stage.get_value(&opacity, TimeCode::Default).expect("Failed to get value"),
            Some(Value::FloatArray(vec![0.5]))
        );
        let order = stage.xform_op_order(&prim, TimeCode::Default).expect("Failed to get op order");
        assert_eq!(order, Some(vec![Token::new("xformOp:transform")]));
    });

    let mut read = Painted::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read sample"));
    assert_eq!(read.color, written.color);
    assert_eq!(read.transform, transform);
}

// ============================================================================
// Binder configurations
// ============================================================================

#[test]
fn test_codegen_matches_late_binding() {
    let late = Arc::new(SerializationContext::with_config(BinderConfig { code_generation: false }));
    let late_scene = Scene::with_context(late, Box::new(MemoryStage::new()));
    let default_scene = Scene::create();
    let prim = path("/World/Gauge");

    late_scene.write(&prim, &gauge()).expect("Failed to write with late binding");
    default_scene.write(&prim, &gauge()).expect("Failed to write with default binding");

    let mut a = Intrinsics::default();
    let mut b = Intrinsics::default();
    late_scene.read(&prim, &mut a).expect("Failed to read with late binding");
    default_scene.read(&prim, &mut b).expect("Failed to read with default binding");
    assert_eq!(a, b);
    assert_eq!(a, gauge());
}
