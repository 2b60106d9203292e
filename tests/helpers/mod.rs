//! Test helpers: a local ingest server that records multipart uploads and
//! answers with scripted status codes.

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use image::{ImageBuffer, ImageFormat, Rgb};

/// One decoded multipart upload as seen by the server.
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub fields: HashMap<String, String>,
    /// (file name, bytes) of the `eventImage` part when present
    pub image: Option<(String, Vec<u8>)>,
}

#[derive(Clone)]
pub struct IngestState {
    pub uploads: Arc<Mutex<Vec<ReceivedUpload>>>,
    /// Status codes served in order; exhausted script answers 200
    responses: Arc<Mutex<VecDeque<u16>>>,
}

impl IngestState {
    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

/// Spawn the ingest server on an ephemeral port. Returns the endpoint URL and
/// the shared recording state.
pub async fn spawn_ingest_server(script: Vec<u16>) -> (String, IngestState) {
    let state = IngestState {
        uploads: Arc::new(Mutex::new(Vec::new())),
        responses: Arc::new(Mutex::new(script.into())),
    };

    let app = Router::new()
        .route("/api/notifications", post(ingest))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind test server");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server error");
    });

    (format!("http://{addr}/api/notifications"), state)
}

async fn ingest(State(state): State<IngestState>, mut multipart: Multipart) -> StatusCode {
    let mut upload = ReceivedUpload {
        fields: HashMap::new(),
        image: None,
    };

    while let Some(field) = multipart.next_field().await.expect("bad multipart") {
        let name = field.name().unwrap_or_default().to_string();
        if name == "eventImage" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.expect("bad image part").to_vec();
            upload.image = Some((file_name, bytes));
        } else {
            let value = field.text().await.expect("bad text part");
            upload.fields.insert(name, value);
        }
    }

    state.uploads.lock().unwrap().push(upload);

    let code = state.responses.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(code).unwrap()
}

/// A small real PNG for artifact tests.
pub fn png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_pixel(2, 2, Rgb([200u8, 100, 50]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
