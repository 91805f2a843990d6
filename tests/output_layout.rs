use slide_ripper::{RipError, grid::TileCoordinate, layout::OutputLayout};

#[test]
fn create_claims_a_fresh_root_under_a_missing_out_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let out = tmp.path().join("scans").join("box-a");
    let layout = OutputLayout::new(&out, "A-01", Some("preview.jpeg"));

    layout.create().unwrap();
    assert!(layout.tiles_dir().is_dir());
    assert_eq!(layout.tiles_dir(), out.join("A-01").join("tiles"));
    assert_eq!(
        layout.tile_path(TileCoordinate::new(3, 7)),
        out.join("A-01").join("tiles").join("3x7.jpeg")
    );
}

#[test]
fn create_refuses_a_root_made_after_the_existence_check() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(tmp.path(), "B-02", Some("preview.jpeg"));
    assert!(!layout.exists());

    // Another run claims the directory between check and create.
    std::fs::create_dir(layout.root()).unwrap();
    std::fs::write(layout.root().join("keep.txt"), b"theirs").unwrap();

    let err = layout.create().err().expect("second claim should fail");
    assert!(matches!(err, RipError::OutputExists(ref p) if p == layout.root()), "{err}");
    assert_eq!(std::fs::read(layout.root().join("keep.txt")).unwrap(), b"theirs");
    assert!(!layout.tiles_dir().exists());
}

#[test]
fn flat_layout_keeps_tiles_at_the_root() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = OutputLayout::new(tmp.path(), "C-03", None);

    layout.create().unwrap();
    assert_eq!(layout.tiles_dir(), layout.root());
    assert!(layout.preview_path().is_none());
    layout.remove();
    assert!(!layout.exists());
}
