//! Handlers serving files from the local file system.

use crate::body::Body;
use crate::dispatcher::{moved_permanently, not_found, plain_text};
use crate::handler::Handler;
use crate::request::{Request, Response};
use crate::responder::content_type;
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{HeaderValue, StatusCode};
use mime::Mime;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

const INDEX: &str = "index.html";

/// Escaped in the links of a directory listing.
const LINK: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'%').add(b'<').add(b'>').add(b'?').add(b'`');

/// Serves the tree below a root directory, resolving the request path against it.
///
/// A directory is answered with its `index.html` when present and with a listing
/// otherwise. Paths escaping the root are not found.
#[derive(Debug, Clone)]
pub struct Dir {
    root: PathBuf,
}

impl Dir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Handler for Dir {
    async fn call(&self, req: Request) -> Response {
        let request_path = req.uri().path();
        let Some(relative) = relative_path(request_path) else {
            return not_found();
        };

        let path = self.root.join(relative);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => return io_error(&path, &e),
        };

        if !metadata.is_dir() {
            return send_file(&path).await;
        }

        if !request_path.ends_with('/') {
            // relative, the path may have lost a prefix on its way here
            let name = request_path.rsplit('/').next().unwrap_or_default();
            return moved_permanently(&format!("{name}/"));
        }

        send_dir(&path).await
    }
}

/// Serves one file for every request it receives.
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Handler for File {
    async fn call(&self, req: Request) -> Response {
        if req.uri().path().split('/').any(|segment| segment == "..") {
            return plain_text(StatusCode::BAD_REQUEST, "invalid URL path\n");
        }

        match tokio::fs::metadata(&self.path).await {
            Ok(metadata) if metadata.is_dir() => send_dir(&self.path).await,
            Ok(_) => send_file(&self.path).await,
            Err(e) => io_error(&self.path, &e),
        }
    }
}

/// Decodes a request path into a path relative to the served root.
///
/// Returns `None` for any `..` segment or anything else that is not a plain file name.
fn relative_path(path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(path).decode_utf8().ok()?;

    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            segment if segment.contains('\\') => return None,
            segment => {
                let mut components = Path::new(segment).components();
                if !matches!((components.next(), components.next()), (Some(Component::Normal(_)), None)) {
                    return None;
                }
                relative.push(segment);
            }
        }
    }
    Some(relative)
}

fn file_content_type(path: &Path) -> HeaderValue {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() == mime::TEXT
        && mime.get_param(mime::CHARSET).is_none()
        && let Ok(utf8) = format!("{mime}; charset=utf-8").parse::<Mime>()
    {
        return content_type(&utf8);
    }
    content_type(&mime)
}

async fn send_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(contents) => {
            let mut response = Response::new(Body::from(contents));
            response.headers_mut().insert(CONTENT_TYPE, file_content_type(path));
            response
        }
        Err(e) => io_error(path, &e),
    }
}

async fn send_dir(dir: &Path) -> Response {
    let index = dir.join(INDEX);
    if tokio::fs::metadata(&index).await.is_ok_and(|metadata| metadata.is_file()) {
        return send_file(&index).await;
    }

    match list_dir(dir).await {
        Ok(names) => {
            let mut html = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
            for name in &names {
                let href = utf8_percent_encode(name, LINK);
                html.push_str(&format!("<a href=\"{href}\">{}</a>\n", html_escape::encode_text(name)));
            }
            html.push_str("</pre>\n");

            let mut response = Response::new(Body::from(html));
            response.headers_mut().insert(CONTENT_TYPE, content_type(&mime::TEXT_HTML_UTF_8));
            response
        }
        Err(e) => io_error(dir, &e),
    }
}

/// Sorted entry names of `dir`, directories marked with a trailing `/`.
async fn list_dir(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await.is_ok_and(|file_type| file_type.is_dir()) {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

fn io_error(path: &Path, e: &io::Error) -> Response {
    match e.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => not_found(),
        io::ErrorKind::PermissionDenied => plain_text(StatusCode::FORBIDDEN, "403 Forbidden\n"),
        _ => {
            warn!(path = %path.display(), "failed to read file: {e}");
            plain_text(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error\n")
        }
    }
}
