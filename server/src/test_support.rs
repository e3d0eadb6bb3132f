use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, header::CONTENT_TYPE},
};
use carte_core::store::{images::InMemoryImageStore, memory::InMemoryDocumentStore};

use crate::state::{AppState, build_state_with_stores};

/// PNG signature followed by an empty IHDR chunk header; enough for MIME sniffing.
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

const BOUNDARY: &str = "carte-test-boundary";

pub(crate) struct TestStores {
    pub(crate) documents: Arc<InMemoryDocumentStore>,
    pub(crate) images: Arc<InMemoryImageStore>,
}

pub(crate) fn setup_state() -> (TestStores, AppState) {
    let documents = Arc::new(InMemoryDocumentStore::default());
    let images = Arc::new(InMemoryImageStore::default());
    let state = build_state_with_stores(documents.clone(), images.clone());
    (TestStores { documents, images }, state)
}

pub(crate) fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .expect("build form request")
}

pub(crate) fn multipart_request(uri: &str, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = Vec::new();
    push_text_fields(&mut body, fields);
    finish_multipart(uri, body)
}

pub(crate) fn item_request(
    uri: &str,
    name: &str,
    price: &str,
    filename: &str,
    image: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    push_text_fields(&mut body, &[("name", name), ("price", price)]);
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(image);
    body.extend_from_slice(b"\r\n");
    finish_multipart(uri, body)
}

fn push_text_fields(body: &mut Vec<u8>, fields: &[(&str, &str)]) {
    for (field, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
}

fn finish_multipart(uri: &str, mut body: Vec<u8>) -> Request<Body> {
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("build multipart request")
}
