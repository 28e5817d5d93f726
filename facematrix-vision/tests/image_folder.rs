use anyhow::Result;
use facematrix_vision::source;
use image::{Rgb, RgbImage};
use std::path::Path;

fn write_png(dir: &Path, name: &str, color: [u8; 3]) -> Result<()> {
    RgbImage::from_pixel(4, 3, Rgb(color)).save(dir.join(name))?;
    Ok(())
}

#[test]
fn test_lists_matching_extension_sorted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_png(dir.path(), "c.png", [1, 2, 3])?;
    write_png(dir.path(), "a.png", [4, 5, 6])?;
    write_png(dir.path(), "B.PNG", [7, 8, 9])?;
    std::fs::write(dir.path().join("notes.txt"), "not an image")?;
    std::fs::create_dir(dir.path().join("nested.png"))?;

    let paths = source::list_images(dir.path(), "png")?;
    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["B.PNG", "a.png", "c.png"]);

    // a leading dot is accepted
    assert_eq!(source::list_images(dir.path(), ".png")?.len(), 3);
    Ok(())
}

#[test]
fn test_loads_rgb_pixels() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_png(dir.path(), "one.png", [10, 20, 30])?;
    write_png(dir.path(), "two.png", [40, 50, 60])?;

    let images = source::load_images(dir.path(), "png")?;
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].label(), "one.png");
    assert_eq!(images[0].image.dimensions(), (4, 3));
    assert_eq!(images[0].image.get_pixel(2, 1), &Rgb([10, 20, 30]));
    assert_eq!(images[1].image.get_pixel(0, 0), &Rgb([40, 50, 60]));
    Ok(())
}

#[test]
fn test_empty_folder_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_png(dir.path(), "face.png", [1, 1, 1])?;

    let err = source::load_images(dir.path(), "jpg").unwrap_err();
    assert!(err.to_string().contains("no *.jpg images"));
    Ok(())
}

#[test]
fn test_corrupt_file_names_the_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_png(dir.path(), "good.png", [1, 1, 1])?;
    std::fs::write(dir.path().join("bad.png"), b"definitely not png")?;

    let err = source::load_images(dir.path(), "png").unwrap_err();
    assert!(format!("{err:#}").contains("bad.png"));
    Ok(())
}

#[test]
fn test_missing_folder_is_an_error() {
    assert!(source::list_images(Path::new("/nonexistent/faces"), "png").is_err());
}
