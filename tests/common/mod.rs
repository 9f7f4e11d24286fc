//! Shared fixtures for the integration tests: trait mocks, a deterministic fake
//! client and image helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use camino::Utf8PathBuf;
use mockall::mock;
use photomuse::models::{AspectRatio, Image, ImageFormat};
use photomuse::services::{ChatSession, InferenceClient, ServiceError};
use photomuse::StudioController;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

mock! {
    pub Inference {}

    #[async_trait]
    impl InferenceClient for Inference {
        async fn edit(&self, image: &Image, instruction: &str) -> Result<Image, ServiceError>;
        async fn analyze(&self, image: &Image, question: Option<String>) -> Result<String, ServiceError>;
        async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<Image, ServiceError>;
        fn create_session(&self) -> Arc<dyn ChatSession>;
    }
}

mock! {
    pub Session {}

    #[async_trait]
    impl ChatSession for Session {
        async fn send(&self, message: &str) -> Result<String, ServiceError>;
    }
}

/// A small in-memory image whose bytes are all `byte`
pub fn image(byte: u8) -> Image {
    Image::new(vec![byte; 16], ImageFormat::Png)
}

/// A real, decodable PNG
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> Utf8PathBuf {
    let path = Utf8PathBuf::try_from(dir.path().join(name)).unwrap();
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_png(dir: &TempDir, name: &str) -> Utf8PathBuf {
    write_file(dir, name, &png_bytes(4, 3))
}

pub fn temp_utf8_dir(dir: &TempDir, name: &str) -> Utf8PathBuf {
    Utf8PathBuf::try_from(dir.path().join(name)).unwrap()
}

pub fn api_error(operation: &'static str, message: &str) -> ServiceError {
    ServiceError::Api {
        operation,
        status: 500,
        message: message.to_string(),
    }
}

/// A mock client whose chat session must never be used
pub fn mock_inference() -> MockInference {
    let mut client = MockInference::new();
    client
        .expect_create_session()
        .times(1)
        .returning(|| Arc::new(MockSession::new()));
    client
}

/// A mock client handing out `session` as its one chat session
pub fn mock_inference_with_session(session: MockSession) -> MockInference {
    let session: Arc<dyn ChatSession> = Arc::new(session);
    let mut client = MockInference::new();
    client
        .expect_create_session()
        .times(1)
        .returning(move || Arc::clone(&session));
    client
}

pub fn studio(client: impl InferenceClient + 'static, download_dir: Utf8PathBuf) -> StudioController {
    StudioController::new(Arc::new(client), download_dir)
}

/// Deterministic fake: an edit appends the instruction's bytes to the input image,
/// so the result of a chain of edits records every step in order.
pub struct ChainingClient;

#[async_trait]
impl InferenceClient for ChainingClient {
    async fn edit(&self, image: &Image, instruction: &str) -> Result<Image, ServiceError> {
        Ok(Image::new(
            [image.bytes(), instruction.as_bytes()].concat(),
            image.format(),
        ))
    }

    async fn analyze(&self, image: &Image, question: Option<String>) -> Result<String, ServiceError> {
        Ok(match question {
            Some(question) => format!("{} ({} bytes)", question, image.len()),
            None => format!("An image of {} bytes", image.len()),
        })
    }

    async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<Image, ServiceError> {
        Ok(Image::new(
            format!("{}@{}", prompt, aspect_ratio).into_bytes(),
            ImageFormat::Png,
        ))
    }

    fn create_session(&self) -> Arc<dyn ChatSession> {
        Arc::new(EchoSession)
    }
}

pub struct EchoSession;

#[async_trait]
impl ChatSession for EchoSession {
    async fn send(&self, message: &str) -> Result<String, ServiceError> {
        Ok(format!("echo: {}", message))
    }
}

/// A session that signals when a send starts and waits to be released
pub struct GatedSession {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
    pub reply: Result<String, String>,
}

impl GatedSession {
    pub fn new(reply: Result<String, String>) -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
            reply,
        }
    }
}

#[async_trait]
impl ChatSession for GatedSession {
    async fn send(&self, _message: &str) -> Result<String, ServiceError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.reply
            .clone()
            .map_err(|message| api_error("Chat", &message))
    }
}

/// A client for chat tests that hands out a prepared session
pub struct SessionClient(pub Arc<dyn ChatSession>);

#[async_trait]
impl InferenceClient for SessionClient {
    async fn edit(&self, _image: &Image, _instruction: &str) -> Result<Image, ServiceError> {
        Err(ServiceError::EmptyResponse)
    }

    async fn analyze(&self, _image: &Image, _question: Option<String>) -> Result<String, ServiceError> {
        Err(ServiceError::EmptyResponse)
    }

    async fn generate(&self, _prompt: &str, _aspect_ratio: AspectRatio) -> Result<Image, ServiceError> {
        Err(ServiceError::EmptyResponse)
    }

    fn create_session(&self) -> Arc<dyn ChatSession> {
        Arc::clone(&self.0)
    }
}
