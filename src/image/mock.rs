use super::{Surface, SurfaceProvider};
use crate::models::{OutputFormat, Quality};
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct EncodeCall {
    pub format: OutputFormat,
    pub quality: Option<Quality>,
    pub width: u32,
    pub height: u32,
}

/// Fake surface provider: decodes any bytes to a blank surface of a fixed
/// size and encodes to a format signature followed by filler bytes.
#[derive(Clone)]
pub struct MockImageProcessor {
    decode_dimensions: Arc<Mutex<(u32, u32)>>,
    decode_delays: Arc<Mutex<VecDeque<Duration>>>,
    encode_delays: Arc<Mutex<VecDeque<Duration>>>,
    fail_decode: Arc<Mutex<bool>>,
    fail_encode: Arc<Mutex<bool>>,
    decode_count: Arc<Mutex<usize>>,
    draw_count: Arc<Mutex<usize>>,
    encode_calls: Arc<Mutex<Vec<EncodeCall>>>,
}

impl MockImageProcessor {
    pub fn new() -> Self {
        Self {
            decode_dimensions: Arc::new(Mutex::new((1, 1))),
            decode_delays: Arc::new(Mutex::new(VecDeque::new())),
            encode_delays: Arc::new(Mutex::new(VecDeque::new())),
            fail_decode: Arc::new(Mutex::new(false)),
            fail_encode: Arc::new(Mutex::new(false)),
            decode_count: Arc::new(Mutex::new(0)),
            draw_count: Arc::new(Mutex::new(0)),
            encode_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_dimensions(self, width: u32, height: u32) -> Self {
        *self.decode_dimensions.lock().unwrap() = (width, height);
        self
    }

    /// Queue a delay for the next decode call; calls without a queued delay finish immediately.
    pub fn with_decode_delay(self, delay: Duration) -> Self {
        self.decode_delays.lock().unwrap().push_back(delay);
        self
    }

    /// Queue a delay for the next encode call, like [`Self::with_decode_delay`].
    pub fn with_encode_delay(self, delay: Duration) -> Self {
        self.encode_delays.lock().unwrap().push_back(delay);
        self
    }

    pub fn with_decode_failure(self, should_fail: bool) -> Self {
        *self.fail_decode.lock().unwrap() = should_fail;
        self
    }

    pub fn with_encode_failure(self, should_fail: bool) -> Self {
        *self.fail_encode.lock().unwrap() = should_fail;
        self
    }

    pub fn set_decode_failure(&self, should_fail: bool) {
        *self.fail_decode.lock().unwrap() = should_fail;
    }

    pub fn get_decode_count(&self) -> usize {
        *self.decode_count.lock().unwrap()
    }

    pub fn get_draw_count(&self) -> usize {
        *self.draw_count.lock().unwrap()
    }

    pub fn get_encode_calls(&self) -> Vec<EncodeCall> {
        self.encode_calls.lock().unwrap().clone()
    }

    fn signature(format: OutputFormat) -> &'static [u8] {
        match format {
            OutputFormat::Jpeg => &[0xFF, 0xD8, 0xFF, 0xE0],
            OutputFormat::Png => &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
            OutputFormat::WebP => b"RIFF\0\0\0\0WEBP",
        }
    }
}

impl Default for MockImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurfaceProvider for MockImageProcessor {
    async fn decode(&self, _data: &[u8]) -> Result<Surface> {
        *self.decode_count.lock().unwrap() += 1;
        let delay = self.decode_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_decode.lock().unwrap() {
            return Err(Error::Decode("Mock decode failure".to_string()));
        }

        let (width, height) = *self.decode_dimensions.lock().unwrap();
        Ok(Surface::blank(width, height))
    }

    async fn draw(&self, _surface: &Surface, width: u32, height: u32) -> Result<Surface> {
        *self.draw_count.lock().unwrap() += 1;
        Ok(Surface::blank(width, height))
    }

    async fn encode(
        &self,
        surface: &Surface,
        format: OutputFormat,
        quality: Option<Quality>,
    ) -> Result<Vec<u8>> {
        let delay = self.encode_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail_encode.lock().unwrap() {
            return Err(Error::Encode("Mock encode failure".to_string()));
        }

        self.encode_calls.lock().unwrap().push(EncodeCall {
            format,
            quality,
            width: surface.width(),
            height: surface.height(),
        });

        let mut bytes = Self::signature(format).to_vec();
        bytes.extend_from_slice(&[0u8; 16]);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_decode_uses_configured_dimensions() {
        let processor = MockImageProcessor::new().with_dimensions(30, 20);

        let surface = processor.decode(b"fake image data").await.unwrap();

        assert_eq!(surface.dimensions(), (30, 20));
        assert_eq!(processor.get_decode_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_records_encode_calls() {
        let processor = MockImageProcessor::new();
        let surface = Surface::blank(3, 4);

        let bytes = processor
            .encode(&surface, OutputFormat::Png, Some(Quality::new(0.3)))
            .await
            .unwrap();

        assert_eq!(&bytes[0..4], &[0x89, 0x50, 0x4E, 0x47]);
        let calls = processor.get_encode_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].format, OutputFormat::Png);
        assert_eq!(calls[0].quality, Some(Quality::new(0.3)));
        assert_eq!((calls[0].width, calls[0].height), (3, 4));
    }

    #[tokio::test]
    async fn test_mock_with_failures() {
        let processor = MockImageProcessor::new()
            .with_decode_failure(true)
            .with_encode_failure(true);

        assert!(matches!(processor.decode(b"data").await, Err(Error::Decode(_))));
        assert!(matches!(
            processor
                .encode(&Surface::blank(1, 1), OutputFormat::Jpeg, None)
                .await,
            Err(Error::Encode(_))
        ));
        assert!(processor.get_encode_calls().is_empty());
    }

    #[tokio::test]
    async fn test_mock_clones_share_counters() {
        let processor = MockImageProcessor::new();
        let recorder = processor.clone();

        processor.decode(b"a").await.unwrap();
        processor.draw(&Surface::blank(1, 1), 5, 5).await.unwrap();

        assert_eq!(recorder.get_decode_count(), 1);
        assert_eq!(recorder.get_draw_count(), 1);
    }
}
