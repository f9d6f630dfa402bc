//! Scripted stand-in for the external image service.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use dyelab::models::{
    ColorSpec, EncodedImage, GenerationSettings, ImageId, RecolorSettings, SourceImage, Tier,
};
use dyelab::services::{ImageGenerator, ServiceError};

use super::fixtures;

#[derive(Debug, Clone)]
struct Failure {
    /// Number of leading attempts that fail; `usize::MAX` fails forever
    times: usize,
    message: String,
}

/// Generator whose answers are scripted per target hex.
///
/// Successful recolors return a solid PNG of the target color, so results can
/// be sampled back. Every call takes `latency` of (virtual) time. Attempts
/// are counted per hex across all images.
pub struct MockGenerator {
    failures: Mutex<HashMap<String, Failure>>,
    attempts: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<(ImageId, String)>>,
    ready: Mutex<Result<(), String>>,
    generate_failure: Mutex<Option<String>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_latency(Duration::from_millis(50))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            failures: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            ready: Mutex::new(Ok(())),
            generate_failure: Mutex::new(None),
            latency,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every recolor to `hex` fails with `message`
    pub fn fail_always(&self, hex: &str, message: &str) {
        self.fail_times(hex, usize::MAX, message);
    }

    /// The first `times` recolors to `hex` fail with `message`
    pub fn fail_times(&self, hex: &str, times: usize, message: &str) {
        self.failures.lock().unwrap().insert(
            hex.to_uppercase(),
            Failure {
                times,
                message: message.to_string(),
            },
        );
    }

    pub fn set_not_ready(&self, reason: &str) {
        *self.ready.lock().unwrap() = Err(reason.to_string());
    }

    pub fn fail_generation(&self, message: &str) {
        *self.generate_failure.lock().unwrap() = Some(message.to_string());
    }

    /// (image, hex) of every recolor call, in call order
    pub fn calls(&self) -> Vec<(ImageId, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, hex: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(&hex.to_uppercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageGenerator for MockGenerator {
    fn check_ready(&self, _tier: Tier) -> Result<(), String> {
        self.ready.lock().unwrap().clone()
    }

    async fn recolor(
        &self,
        image: &SourceImage,
        color: &ColorSpec,
        _settings: &RecolorSettings,
    ) -> Result<EncodedImage, ServiceError> {
        let hex = color.hex().to_string();
        self.calls
            .lock()
            .unwrap()
            .push((image.id.clone(), hex.clone()));
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let n = attempts.entry(hex.clone()).or_insert(0);
            *n += 1;
            *n
        };

        self.simulate_call().await;

        let failure = self.failures.lock().unwrap().get(&hex).cloned();
        match failure {
            Some(f) if attempt <= f.times => Err(ServiceError::new(f.message)),
            _ => Ok(EncodedImage::new(
                "image/png",
                fixtures::solid_png(4, 4, color.rgb().to_bytes()),
            )),
        }
    }

    async fn generate(&self, _settings: &GenerationSettings) -> Result<EncodedImage, ServiceError> {
        self.simulate_call().await;
        let failure = self.generate_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(ServiceError::new(message));
        }
        Ok(EncodedImage::new("image/png", fixtures::solid_png(4, 4, [1, 2, 3])))
    }
}
