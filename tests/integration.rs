use image::{ImageFormat, Rgb, RgbImage};
use image_multitool::{
    app::{App, AppServices, Command},
    export::{extension_for_mime, save_download},
    image::{ImageProcessor, MockImageProcessor, SurfaceProvider},
    models::{OutputFormat, SizeUnit, ToolKind},
    store::{BlobStore, MemoryBlobStore},
    tool::{ImageTool, Outcome, ToolState},
};
use pretty_assertions::assert_eq;
use std::io::Cursor;
use std::sync::Arc;

fn fake_jpeg(len: usize) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.resize(len, 0);
    bytes
}

fn real_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 5) as u8, (y * 9) as u8, ((x + y) * 3) as u8])
    });
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Jpeg)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_end_to_end_resize_then_compress_with_mocks() {
    // 2000x1000 JPEG of 800KB
    let surfaces = MockImageProcessor::new().with_dimensions(2000, 1000);
    let recorder = surfaces.clone();
    let store = MemoryBlobStore::new();
    let surfaces: Arc<dyn SurfaceProvider> = Arc::new(surfaces);
    let shared_store: Arc<dyn BlobStore> = Arc::new(store.clone());

    let resizer = ImageTool::resizer(Arc::clone(&surfaces), Arc::clone(&shared_store));
    let compressor = ImageTool::compressor(surfaces, shared_store);
    let source = fake_jpeg(800 * 1024);

    resizer
        .load(source.clone(), Some("image/jpeg"))
        .await
        .unwrap();
    let resized = resizer
        .resize(500, 500, OutputFormat::Png)
        .await
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!((resized.width, resized.height), (500, 500));
    assert_eq!(resized.mime_type, "image/png");
    assert!(resized.download.file_name.ends_with(".png"));
    let png = store.fetch(&resized.download.object_url).await.unwrap();
    assert_eq!(&png[0..4], &[0x89, 0x50, 0x4E, 0x47]);

    compressor.load(source, Some("image/jpeg")).await.unwrap();
    let compressed = compressor
        .compress(400.0, SizeUnit::Kb, OutputFormat::Jpeg)
        .await
        .unwrap()
        .applied()
        .unwrap();
    assert!((compressed.quality.unwrap() - 0.5).abs() < 1e-9);
    assert_eq!(compressed.download.file_name, "compressed-image.jpg");
    assert_eq!((compressed.width, compressed.height), (2000, 1000));

    let last = recorder.get_encode_calls().pop().unwrap();
    assert_eq!(last.format, OutputFormat::Jpeg);
    assert!((last.quality.unwrap().value() - 0.5).abs() < 1e-9);

    // Each tool owns its own live result.
    assert_eq!(store.live_count(), 2);
    compressor.clear().await;
    assert_eq!(compressor.state(), ToolState::Empty);
    assert!(!compressor.can_download());
    assert_eq!(resizer.state(), ToolState::ResultProduced);
    assert_eq!(store.live_count(), 1);
}

#[tokio::test]
async fn test_real_codec_resize_stretches() {
    let tool = ImageTool::resizer(
        Arc::new(ImageProcessor::new()),
        Arc::new(MemoryBlobStore::new()),
    );
    tool.load(real_jpeg(64, 32), None).await.unwrap();
    assert_eq!(tool.default_dimensions(), Some((64, 32)));

    let result = tool
        .resize(10, 40, OutputFormat::Png)
        .await
        .unwrap()
        .applied()
        .unwrap();
    assert_eq!((result.width, result.height), (10, 40));

    let produced = tool.result().unwrap();
    let decoded = image::load_from_memory(&produced.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (10, 40));
    assert_eq!(
        image::guess_format(&produced.bytes).unwrap(),
        ImageFormat::Png
    );
}

#[tokio::test]
async fn test_real_codec_compress_keeps_native_resolution() {
    let tool = ImageTool::compressor(
        Arc::new(ImageProcessor::new()),
        Arc::new(MemoryBlobStore::new()),
    );
    let source = real_jpeg(48, 48);
    let source_kb = source.len() as f64 / 1024.0;
    tool.load(source, Some("image/jpeg")).await.unwrap();

    let result = tool
        .compress(source_kb / 4.0, SizeUnit::Kb, OutputFormat::WebP)
        .await
        .unwrap()
        .applied()
        .unwrap();

    assert!((result.quality.unwrap() - 0.25).abs() < 1e-9);
    let produced = tool.result().unwrap();
    let decoded = image::load_from_memory(&produced.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (48, 48));
    assert_eq!(tool.download().unwrap().file_name, "compressed-image.webp");
}

#[tokio::test]
async fn test_real_codec_rejects_corrupt_jpeg() {
    let tool = ImageTool::resizer(
        Arc::new(ImageProcessor::new()),
        Arc::new(MemoryBlobStore::new()),
    );

    let result = tool.load(fake_jpeg(256), Some("image/jpeg")).await;

    assert!(result.is_err());
    assert_eq!(tool.state(), ToolState::Empty);
    assert_eq!(
        tool.resize(5, 5, OutputFormat::Jpeg).await.unwrap(),
        Outcome::Disabled
    );
}

#[tokio::test]
async fn test_app_writes_download_to_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("holiday.jpeg");
    std::fs::write(&input, real_jpeg(30, 20)).unwrap();
    let output_dir = dir.path().join("downloads");

    let app = App::with_services(
        AppServices {
            surfaces: Arc::new(ImageProcessor::new()),
            store: Arc::new(MemoryBlobStore::new()),
        },
        output_dir.clone(),
    );

    let report = app
        .run(Command::Resize {
            input,
            width: None,
            height: None,
            format: OutputFormat::WebP,
        })
        .await
        .unwrap();

    assert_eq!(report.tool, ToolKind::Resize);
    assert_eq!((report.source.width, report.source.height), (30, 20));
    assert_eq!(report.output_path, output_dir.join("resized-image.webp"));
    let saved = image::open(&report.output_path).unwrap();
    assert_eq!((saved.width(), saved.height()), (30, 20));

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"tool\":\"resize\""));
}

#[tokio::test]
async fn test_download_names_follow_result_mime() {
    let store = MemoryBlobStore::new();
    let dir = tempfile::tempdir().unwrap();
    let tool = ImageTool::resizer(
        Arc::new(MockImageProcessor::new()),
        Arc::new(store.clone()),
    );
    tool.load(fake_jpeg(64), None).await.unwrap();

    for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::WebP] {
        tool.resize(4, 4, format).await.unwrap();
        let download = tool.download().unwrap();
        assert_eq!(
            download.file_name,
            format!("resized-image.{}", extension_for_mime(format.mime_type()))
        );
        let path = save_download(&store, &download, dir.path()).await.unwrap();
        assert!(path.exists());
    }
    assert_eq!(store.live_count(), 1);
}
