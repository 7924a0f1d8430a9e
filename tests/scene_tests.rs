//! Integration tests for scene-level operations: write modes, persistence,
//! queries, schema configuration and array release.

use std::sync::Arc;

use usd_io::core::{UpAxis, Variability};
use usd_io::prelude::*;
use usd_io::serialization::ArrayAllocator;

use tempfile::NamedTempFile;

#[derive(Default, Debug, Clone, PartialEq)]
struct Cube {
    size: f64,
    points: Vec<Vec3>,
    normals: Vec<Vec3>,
}

impl Sample for Cube {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.schema_name("Cube");
        s.field("size", |c| &c.size, |c| &mut c.size);
        s.field("points", |c| &c.points, |c| &mut c.points);
        s.field("normals", |c| &c.normals, |c| &mut c.normals);
    }
}

#[derive(Default, Debug, PartialEq)]
struct Xform {
    visibility: Token,
}

impl Sample for Xform {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.schema_name("Xform");
        s.field("visibility", |x| &x.visibility, |x| &mut x.visibility);
    }
}

fn path(p: &str) -> SdfPath {
    SdfPath::new(p).expect("Failed to parse path")
}

fn cube(size: f64) -> Cube {
    Cube { size, points: vec![Vec3::ONE; 8], normals: vec![Vec3::Z; 8] }
}

// ============================================================================
// Write modes
// ============================================================================

#[test]
fn test_define_mode_types_prim() {
    let scene = Scene::create();
    let prim = path("/World/Cube");
    scene.write(&prim, &cube(1.0)).expect("Failed to write cube");

    assert_eq!(scene.find_by_type(&SdfPath::absolute_root(), "Cube"), vec![prim.clone()]);
    assert!(scene.prim_exists(&path("/World")));

    // An Xform written over a typed prim keeps the existing type.
    let xform = Xform { visibility: Token::new("inherited") };
    scene.write(&prim, &xform).expect("Failed to write xform");
    assert_eq!(scene.find::<Cube>(&SdfPath::absolute_root()).expect("Failed to find cubes"), vec![prim.clone()]);

    let other = path("/World/Group");
    scene.write(&other, &xform).expect("Failed to write group");
    assert_eq!(scene.find::<Xform>(&path("/World")).expect("Failed to find xforms"), vec![other]);
}

#[test]
fn test_over_mode_keeps_type() {
    let scene = Scene::create();
    let prim = path("/World/Cube");
    scene.write(&prim, &cube(1.0)).expect("Failed to write cube");

    scene.set_write_mode(WriteMode::Over);
    scene.write(&prim, &Cube { size: 4.0, ..cube(1.0) }).expect("Failed to write override");
    let untyped = path("/World/Override");
    scene.write(&untyped, &cube(2.0)).expect("Failed to write override");

    assert_eq!(scene.find::<Cube>(&SdfPath::absolute_root()).expect("Failed to find cubes"), vec![prim.clone()]);
    assert!(scene.prim_exists(&untyped));

    let mut read = Cube::default();
    scene.read(&prim, &mut read).expect("Failed to read cube");
    assert_eq!(read.size, 4.0);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_save_and_open() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let prim = path("/World/Cube");

    {
        let scene = Scene::create();
        scene.set_frame_rate(30.0).expect("Failed to set frame rate");
        scene.set_up_axis(UpAxis::Y);
        scene.set_start_time(1.0);
        scene.set_end_time(2.0);
        for frame in 1..=2 {
            scene.set_time(frame as f64);
            scene.write(&prim, &cube(frame as f64)).expect("Failed to write cube");
        }
        scene.save_as(temp.path()).expect("Failed to save scene");
        // save_as does not adopt the path.
        assert!(scene.file_path().is_none());
    }

    let scene = Scene::open(temp.path()).expect("Failed to open scene");
    assert_eq!(scene.file_path().as_deref(), Some(temp.path()));
    assert_eq!(scene.frame_rate(), 30.0);
    assert_eq!(scene.up_axis(), UpAxis::Y);
    assert_eq!((scene.start_time(), scene.end_time()), (1.0, 2.0));

    scene.set_time(2.0);
    let mut read = Cube::default();
    assert!(scene.read(&prim, &mut read).expect("Failed to read cube"));
    assert_eq!(read, cube(2.0));

    scene.save().expect("Failed to save to opened path");
}

#[test]
fn test_open_missing_file() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let missing = temp.path().with_extension("missing.json");
    assert!(Scene::open(&missing).is_err());
}

// ============================================================================
// Reads
// ============================================================================

#[test]
fn test_read_missing_prim() {
    let scene = Scene::create();
    let mut read = cube(3.0);
    assert!(!scene.read(&path("/Nowhere"), &mut read).expect("Failed to read"));
    assert_eq!(read, cube(3.0));
}

#[test]
fn test_read_many_keeps_order() {
    let scene = Scene::create();
    let paths: Vec<SdfPath> = (0..16).map(|i| path(&format!("/World/Cube{i}"))).collect();
    for (i, p) in paths.iter().enumerate() {
        scene.write(p, &cube(i as f64)).expect("Failed to write cube");
    }

    let cubes: Vec<Cube> = scene.read_many(&paths).expect("Failed to read cubes");
    let sizes: Vec<f64> = cubes.iter().map(|c| c.size).collect();
    assert_eq!(sizes, (0..16).map(|i| i as f64).collect::<Vec<_>>());

    let all = scene.read_all::<Cube>(&path("/World")).expect("Failed to read all cubes");
    assert_eq!(all.len(), 16);
}

#[test]
fn test_read_single_member() {
    let scene = Scene::create();
    let prim = path("/World/Cube");
    scene.write(&prim, &cube(5.0)).expect("Failed to write cube");

    let mut read = Cube::default();
    assert!(scene.read_member(&prim, &mut read, "size").expect("Failed to read member"));
    assert_eq!(read.size, 5.0);
    assert!(read.points.is_empty());

    let err = scene.read_member(&prim, &mut read, "colour").expect_err("Unknown member should fail");
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_threaded_writes() {
    let scene = Arc::new(Scene::create());
    std::thread::scope(|s| {
        for t in 0..4 {
            let scene = scene.clone();
            s.spawn(move || {
                for i in 0..8 {
                    let p = path(&format!("/T{t}/Cube{i}"));
                    scene.write(&p, &cube(i as f64)).expect("Failed to write cube");
                }
            });
        }
    });
    assert_eq!(scene.find::<Cube>(&SdfPath::absolute_root()).expect("Failed to find cubes").len(), 32);
}

// ============================================================================
// Schema configuration
// ============================================================================

#[derive(Default)]
struct Duplicate {
    a: f32,
    b: f32,
}

impl Sample for Duplicate {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("width", |d| &d.a, |d| &mut d.a);
        s.field("width", |d| &d.b, |d| &mut d.b);
    }
}

#[derive(Default)]
struct BadElementSize {
    points: Vec<f32>,
}

impl Sample for BadElementSize {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("points", |d| &d.points, |d| &mut d.points).vertex_data(0);
    }
}

#[test]
fn test_configuration_errors() {
    let scene = Scene::create();
    let err = scene.write(&path("/World/Dup"), &Duplicate::default()).expect_err("Duplicate member should fail");
    assert!(matches!(err, Error::Configuration(_)), "unexpected error: {err}");

    let err = scene
        .write(&path("/World/Bad"), &BadElementSize::default())
        .expect_err("Element size 0 should fail");
    assert!(matches!(err, Error::Configuration(_)), "unexpected error: {err}");
}

#[test]
fn test_member_metadata_cached() {
    let ctx = SerializationContext::new();
    let reflect = ctx.reflect();
    let schema = reflect.get_schema_of::<Cube>().expect("Failed to get schema");
    let again = reflect.get_schema_of::<Cube>().expect("Failed to get schema");
    assert!(Arc::ptr_eq(&schema, &again));

    let first = reflect.get_cache_entry(&schema, 0).expect("Failed to get member info");
    let second = reflect.get_cache_entry(&schema, 0).expect("Failed to get member info");
    assert!(Arc::ptr_eq(&first, &second));

    assert_eq!(first.name, "size");
    assert_eq!(first.variability, Variability::Varying);
    assert_eq!(first.element_size, 1);
    assert!(first.namespace.is_empty());
    assert!(!first.is_primvar && !first.is_metadata && !first.is_non_serialized);

    let a = ctx.tokens().intern("primvars", "st");
    let b = ctx.tokens().intern("primvars", "st");
    assert_eq!(a.as_str(), "primvars:st");
    assert!(Token::ptr_eq(&a, &b));
}

// ============================================================================
// Array release
// ============================================================================

#[test]
fn test_release_once() {
    let pool = Arc::new(ArrayAllocator::new());
    let ctx = SerializationContext::new().with_pool(pool.clone());

    let mut sample = cube(1.0);
    assert_eq!(ctx.release_sample(&mut sample).expect("Failed to release arrays"), 2);
    assert!(sample.points.is_empty() && sample.normals.is_empty());
    assert_eq!(sample.size, 1.0);

    // Released members are empty; a second release returns nothing.
    assert_eq!(ctx.release_sample(&mut sample).expect("Failed to release arrays"), 0);
    assert_eq!(pool.returned(), 2);
}

#[derive(Default)]
struct Curves {
    strands: Vec<Vec<f32>>,
}

impl Sample for Curves {
    fn describe(s: &mut SchemaBuilder<Self>) {
        s.field("strands", |c| &c.strands, |c| &mut c.strands);
    }
}

#[test]
fn test_release_rejects_nested_arrays() {
    let ctx = SerializationContext::new();
    let mut sample = Curves { strands: vec![vec![1.0, 2.0]] };
    let err = ctx.release_sample(&mut sample).expect_err("Rank 2 arrays should not release");
    assert!(matches!(err, Error::Unsupported(_)));
    assert_eq!(sample.strands.len(), 1);
}
