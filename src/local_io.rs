//! Local device I/O: choosing a source image and saving colorized results.
//!
//! The pickers are modelled after the platform choosers: both crop to a 1:1 aspect,
//! and the camera path compresses hard to bound the upload size. [`FilePicker`]
//! provides that behaviour for a desktop host, reading an existing file instead of
//! opening a native dialog.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use rand::Rng;
use reqwest::Client;
use serde::Serialize;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};

use crate::error::{ColorizerError, Result};

/// Album the gallery copy is imported into.
pub const GALLERY_ALBUM: &str = "Download";

/// JPEG quality used for camera captures.
pub const CAMERA_QUALITY: u8 = 30;

/// A local image chosen by the user, consumed by one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedAsset {
    pub uri: String,
    /// Set when the file was produced by the picker and should be removed after use.
    pub temporary: bool,
}

impl PickedAsset {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            temporary: false,
        }
    }

    pub fn discard(self) {
        if !self.temporary {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.uri) {
            tracing::debug!(uri = %self.uri, error = %e, "failed to remove picked asset");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickOutcome {
    Cancelled,
    Picked(PickedAsset),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickerOptions {
    /// Width:height ratio the result is cropped to.
    pub aspect: (u32, u32),
    /// JPEG quality (1-100); `None` keeps a lossless PNG.
    pub quality: Option<u8>,
}

impl PickerOptions {
    pub const LIBRARY: PickerOptions = PickerOptions {
        aspect: (1, 1),
        quality: None,
    };

    pub const CAMERA: PickerOptions = PickerOptions {
        aspect: (1, 1),
        quality: Some(CAMERA_QUALITY),
    };
}

#[async_trait]
pub trait AssetPicker: Send + Sync {
    async fn pick_from_library(&self) -> Result<PickOutcome>;

    async fn capture_from_camera(&self) -> Result<PickOutcome>;
}

/// Picks an existing image file, either given up front or asked for on stdin.
#[derive(Debug, Clone)]
pub struct FilePicker {
    source: Option<PathBuf>,
    work_dir: PathBuf,
}

impl FilePicker {
    pub fn new(source: Option<PathBuf>) -> Self {
        Self {
            source,
            work_dir: std::env::temp_dir(),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    async fn pick(&self, options: PickerOptions) -> Result<PickOutcome> {
        let source = match &self.source {
            Some(path) => Some(path.clone()),
            None => tokio::task::spawn_blocking(prompt_for_path)
                .await
                .map_err(|e| ColorizerError::Unknown(format!("picker prompt failed: {e}")))?,
        };
        let Some(source) = source else {
            tracing::debug!("image pick cancelled");
            return Ok(PickOutcome::Cancelled);
        };

        let work_dir = self.work_dir.clone();
        let asset = tokio::task::spawn_blocking(move || prepare_asset(&source, &work_dir, options))
            .await
            .map_err(|e| ColorizerError::Unknown(format!("image preparation failed: {e}")))??;
        Ok(PickOutcome::Picked(asset))
    }
}

#[async_trait]
impl AssetPicker for FilePicker {
    async fn pick_from_library(&self) -> Result<PickOutcome> {
        self.pick(PickerOptions::LIBRARY).await
    }

    async fn capture_from_camera(&self) -> Result<PickOutcome> {
        self.pick(PickerOptions::CAMERA).await
    }
}

/// An empty answer, EOF or a non-interactive stdin cancels the pick.
fn prompt_for_path() -> Option<PathBuf> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return None;
    }
    let mut stderr = io::stderr();
    write!(stderr, "Path to image (leave empty to cancel): ").ok()?;
    stderr.flush().ok()?;

    let mut answer = String::new();
    stdin.lock().read_line(&mut answer).ok()?;
    let answer = answer.trim();
    (!answer.is_empty()).then(|| PathBuf::from(answer))
}

fn prepare_asset(source: &Path, work_dir: &Path, options: PickerOptions) -> Result<PickedAsset> {
    let img = image::open(source)?;
    let cropped = crop_to_aspect(&img, options.aspect);

    std::fs::create_dir_all(work_dir)?;
    let suffix: u32 = rand::thread_rng().gen();
    let extension = if options.quality.is_some() { "jpg" } else { "png" };
    let target = work_dir.join(format!("colorizer-pick-{suffix:08x}.{extension}"));

    match options.quality {
        Some(quality) => {
            let rgb = cropped.to_rgb8();
            let file = std::fs::File::create(&target)?;
            let mut encoder = JpegEncoder::new_with_quality(io::BufWriter::new(file), quality);
            encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?;
        }
        None => cropped.save_with_format(&target, ImageFormat::Png)?,
    }

    tracing::debug!(source = %source.display(), target = %target.display(), "prepared picked asset");
    Ok(PickedAsset {
        uri: target.to_string_lossy().into_owned(),
        temporary: true,
    })
}

/// Largest centred region with the requested width:height ratio.
pub fn crop_to_aspect(img: &DynamicImage, aspect: (u32, u32)) -> DynamicImage {
    let (width, height) = img.dimensions();
    let (aw, ah) = (aspect.0.max(1) as u64, aspect.1.max(1) as u64);

    let (crop_w, crop_h) = if width as u64 * ah > height as u64 * aw {
        ((height as u64 * aw / ah) as u32, height)
    } else {
        (width, (width as u64 * ah / aw) as u32)
    };
    let x = (width - crop_w) / 2;
    let y = (height - crop_h) / 2;
    img.crop_imm(x, y, crop_w.max(1), crop_h.max(1))
}

/// Where a saved image ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedImage {
    pub document_path: PathBuf,
    pub gallery_path: PathBuf,
}

/// Downloads `remote_url` to `{documents_dir}/{base_name}.png` and imports a copy
/// into the gallery's `Download` album. Nothing is left behind on failure.
pub async fn save_remote_image_locally(
    http: &Client,
    remote_url: &str,
    base_name: &str,
    documents_dir: &Path,
    gallery_dir: &Path,
) -> Result<SavedImage> {
    if base_name.is_empty() || base_name.contains(['/', '\\']) || base_name.starts_with('.') {
        return Err(ColorizerError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid file name {base_name:?}"),
        )));
    }

    let bytes = download(http, remote_url).await?;
    let file_name = format!("{base_name}.png");

    let document_path = documents_dir.join(&file_name);
    write_whole(&document_path, &bytes).await?;

    let album = gallery_dir.join(GALLERY_ALBUM);
    let gallery_path = album.join(&file_name);
    let imported = async {
        tokio::fs::create_dir_all(&album).await?;
        tokio::fs::copy(&document_path, &gallery_path).await?;
        Ok::<_, io::Error>(())
    }
    .await;
    if let Err(e) = imported {
        let _ = tokio::fs::remove_file(&document_path).await;
        return Err(e.into());
    }

    tracing::info!(path = %gallery_path.display(), "image saved to gallery");
    Ok(SavedImage {
        document_path,
        gallery_path,
    })
}

async fn download(http: &Client, url: &str) -> Result<Vec<u8>> {
    let to_io = |e: reqwest::Error| io::Error::other(format!("download of {url} failed: {e}"));
    let response = http.get(url).send().await.map_err(to_io)?;
    let status = response.status();
    if !status.is_success() {
        return Err(io::Error::other(format!(
            "download of {url} failed with status {}",
            status.as_u16()
        ))
        .into());
    }
    Ok(response.bytes().await.map_err(to_io)?.to_vec())
}

/// Writes through a sibling `.part` file so an interrupted write never leaves a
/// truncated image under the final name.
async fn write_whole(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = tokio::fs::write(&partial, bytes).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&partial, path).await {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(e.into());
    }
    Ok(())
}
