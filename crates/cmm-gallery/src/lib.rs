//! Static gallery page emitter.
//!
//! Renders one self-contained `model_card.html` per model: a header with
//! the model's remote link and metadata, a click-to-copy tag list, a grid
//! of media tiles referencing the `images/` subdirectory, and a modal
//! overlay showing the enlarged media next to its prompt, checkpoint,
//! loras and reaction stats. Bootstrap and Google Fonts come from CDNs
//! and are cosmetic only; the page works without them.

use std::path::{Path, PathBuf};

use cmm_core::{ModelImage, ModelInfo};
use thiserror::Error;

/// File name of the emitted page.
pub const MODEL_CARD_FILE: &str = "model_card.html";

/// Errors from gallery emission.
#[derive(Debug, Error)]
pub enum GalleryError {
    /// Writing the page failed.
    #[error("Failed to write {path}: {message}")]
    Write {
        /// Target path.
        path: String,
        /// Detailed error message.
        message: String,
    },
}

/// Escape a string for safe embedding in HTML text or attribute position.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Render the gallery page for a model.
#[must_use]
pub fn render_model_card(info: &ModelInfo) -> String {
    let model_url = format!("https://civitai.com/models/{}", info.id);
    let mut lines: Vec<String> = Vec::with_capacity(64 + info.images.len());

    lines.push("<!DOCTYPE html>".to_string());
    lines.push("<html lang='en'>".to_string());
    lines.push("<head>".to_string());
    lines.push("<meta charset='utf-8'>".to_string());
    lines.push("<meta name='viewport' content='width=device-width,initial-scale=1'>".to_string());
    lines.push(format!(
        "<title>{} - Model Gallery</title>",
        escape_html(&info.name)
    ));
    lines.push(
        "<link href='https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css' rel='stylesheet'>"
            .to_string(),
    );
    lines.push(
        "<link href='https://fonts.googleapis.com/css2?family=Inter:wght@400;600&display=swap' rel='stylesheet'>"
            .to_string(),
    );
    lines.push(STYLE.to_string());
    lines.push("</head>".to_string());
    lines.push("<body>".to_string());
    lines.push("<div class='container py-4'>".to_string());
    lines.push(format!(
        "<h2 class='text-info mb-2'>Model: {}</h2>",
        escape_html(&info.name)
    ));
    lines.push(format!(
        "<p><strong>URL:</strong> <a href='{url}' class='text-info' target='_blank'>{url}</a></p>",
        url = escape_html(&model_url)
    ));
    lines.push(format!(
        "<p><strong>Type:</strong> {} | <strong>Base Model:</strong> {}</p>",
        escape_html(info.model_type.as_remote_str()),
        escape_html(&info.base_model)
    ));
    lines.push(format!(
        "<p><strong>Creator:</strong> {} | <strong>Version:</strong> {}</p>",
        escape_html(&info.creator),
        escape_html(&info.version_name)
    ));
    lines.push("<h5>Description</h5>".to_string());
    lines.push(format!(
        "<p style='max-width: 800px;'>{}</p>",
        escape_html(&info.description)
    ));
    lines.push("<h5>Activation Tags</h5>".to_string());
    lines.push("<div class='mb-3'>".to_string());
    for tag in &info.tags {
        let escaped = escape_html(tag);
        lines.push(format!(
            "<span class='badge bg-secondary me-1 mb-1' \
             onclick=\"navigator.clipboard.writeText('{escaped}');\" title='Copy tag'>\
             {escaped}</span>"
        ));
    }
    lines.push("</div>".to_string());
    lines.push("<h5 class='mb-3'>Images</h5>".to_string());
    lines.push("<div class='gallery-row mb-5'>".to_string());

    for (idx, image) in info.images.iter().enumerate() {
        lines.push(render_tile(idx, image));
    }

    lines.push("</div>".to_string());
    lines.push(OVERLAY.to_string());
    lines.push("</body></html>".to_string());

    lines.join("\n")
}

/// Render the gallery page into `model_dir / model_card.html`.
pub fn write_model_card(model_dir: &Path, info: &ModelInfo) -> Result<PathBuf, GalleryError> {
    let out_path = model_dir.join(MODEL_CARD_FILE);
    let html = render_model_card(info);
    std::fs::write(&out_path, html).map_err(|e| GalleryError::Write {
        path: out_path.display().to_string(),
        message: e.to_string(),
    })?;
    tracing::info!(path = %out_path.display(), "Wrote model card");
    Ok(out_path)
}

/// One media tile. Local images are referenced relative to the page
/// (`images/<file>`), images that were never downloaded keep their remote
/// URL.
fn render_tile(idx: usize, image: &ModelImage) -> String {
    let src = image
        .local_path
        .as_deref()
        .and_then(|p| Path::new(p).file_name())
        .and_then(|name| name.to_str())
        .map_or_else(|| image.url.clone(), |name| format!("images/{name}"));

    let meta = image.meta.as_ref();
    let prompt = escape_html(meta.and_then(|m| m.prompt.as_deref()).unwrap_or("N/A"));
    let checkpoint = escape_html(meta.and_then(|m| m.model.as_deref()).unwrap_or("N/A"));
    let loras = escape_html(
        &meta
            .map(|m| m.lora_names().join(", "))
            .unwrap_or_default(),
    );

    let stats = &image.stats;
    let stats_str = format!(
        "👍 {} | ❤️ {} | 😂 {} | Score: {}",
        stats.like_count,
        stats.heart_count,
        stats.laugh_count,
        stats.score()
    );

    let src = escape_html(&src);
    if src.to_lowercase().ends_with(".mp4") {
        format!(
            "<video src='{src}' class='gallery-img' controls data-idx='{idx}' \
             data-prompt=\"{prompt}\" data-chk=\"{checkpoint}\" data-loras=\"{loras}\" \
             data-stats=\"{stats_str}\" tabindex='0' preload='metadata' poster=''>\
             Sorry, your browser doesn't support embedded videos.</video>"
        )
    } else {
        format!(
            "<img src='{src}' class='gallery-img' data-idx='{idx}' \
             data-prompt=\"{prompt}\" data-chk=\"{checkpoint}\" data-loras=\"{loras}\" \
             data-stats=\"{stats_str}\" alt='Model image {n}' tabindex='0'/>",
            n = idx + 1
        )
    }
}

const STYLE: &str = "<style>
body { background: #181a1b; color: #e0e0e0; font-family: 'Inter', sans-serif; }
.container { max-width: 1200px; }
h2, h5 { font-weight: 600; }
.badge { cursor: pointer; user-select: all; font-size: 1rem; margin-bottom: 6px; }
.gallery-row { display: flex; flex-wrap: wrap; gap: 20px; }
.gallery-img { flex: 1 0 18%; max-width: 18%; aspect-ratio: 1/1; object-fit: cover; border-radius: 10px; cursor: pointer; transition: box-shadow .2s, transform .2s; box-shadow: 0 2px 8px #0004; }
.gallery-img:hover { box-shadow: 0 4px 24px #0007; transform: scale(1.03); }
@media (max-width: 1200px) { .gallery-img { max-width: 23%; } }
@media (max-width: 900px) { .gallery-img { max-width: 31%; } }
@media (max-width: 600px) { .gallery-img { max-width: 48%; } }
.overlay-bg { display: none; position: fixed; z-index: 10000; top: 0; left: 0; width: 100vw; height: 100vh; background: rgba(0,0,0,0.85); align-items: center; justify-content: center; }
.overlay-bg.active { display: flex; }
.overlay-img { max-height: 80vh; max-width: 55vw; border-radius: 12px 0 0 12px; box-shadow: 0 0 32px #000a; background: #222; }
.overlay-panel { width: 350px; max-width: 90vw; background: #222; color: #fff; padding: 32px 24px; border-radius: 0 12px 12px 0; box-shadow: 0 0 32px #000a; display: flex; flex-direction: column; gap: 18px; }
.overlay-close { position: absolute; top: 22px; right: 32px; font-size: 2rem; color: #fff; cursor: pointer; opacity: 0.75; transition: opacity .2s; z-index: 10001; }
.overlay-close:hover { opacity: 1; }
.panel-label { font-size: 0.98rem; color: #aaa; margin-bottom: 2px; }
.panel-content { font-size: 1.08rem; word-break: break-word; }
</style>";

const OVERLAY: &str = "<div class='overlay-bg' id='overlayBg' tabindex='-1'>
<span class='overlay-close' id='overlayClose' title='Close'>&times;</span>
<img src='' class='overlay-img' id='overlayImg' alt='Enlarged image' style='display:none;'/>
<video src='' class='overlay-video' id='overlayVideo' controls style='display:none;max-height:80vh;max-width:55vw;border-radius:12px 0 0 12px;box-shadow:0 0 32px #000a;background:#222;'></video>
<div class='overlay-panel' id='overlayPanel'>
  <div>
    <div class='panel-label'>Prompt</div>
    <div class='panel-content' id='panelPrompt'></div>
  </div>
  <div>
    <div class='panel-label'>Checkpoint</div>
    <div class='panel-content' id='panelChk'></div>
  </div>
  <div>
    <div class='panel-label'>Loras</div>
    <div class='panel-content' id='panelLoras'></div>
  </div>
  <div>
    <div class='panel-label'>Reactions</div>
    <div class='panel-content' id='panelStats'></div>
  </div>
</div>
</div>

<script>
const overlayBg = document.getElementById('overlayBg');
const overlayImg = document.getElementById('overlayImg');
const overlayVideo = document.getElementById('overlayVideo');
const overlayPanel = document.getElementById('overlayPanel');
const overlayClose = document.getElementById('overlayClose');
const panelPrompt = document.getElementById('panelPrompt');
const panelChk = document.getElementById('panelChk');
const panelLoras = document.getElementById('panelLoras');
const panelStats = document.getElementById('panelStats');

function showOverlay(mediaEl) {
  if (mediaEl.tagName === \"VIDEO\") {
      overlayImg.style.display = \"none\";
      overlayVideo.style.display = \"\";
      overlayVideo.src = mediaEl.src;
      overlayVideo.load();
      overlayVideo.play();
  } else {
      overlayVideo.pause();
      overlayVideo.style.display = \"none\";
      overlayImg.style.display = \"\";
      overlayImg.src = mediaEl.src;
  }
  panelPrompt.textContent = mediaEl.dataset.prompt || '';
  panelChk.textContent = mediaEl.dataset.chk || '';
  panelLoras.textContent = mediaEl.dataset.loras || '';
  panelStats.textContent = mediaEl.dataset.stats || '';
  overlayBg.classList.add('active');
  document.body.style.overflow = 'hidden';
}

function hideOverlay() {
  overlayBg.classList.remove('active');
  overlayImg.src = '';
  overlayImg.style.display = \"none\";
  overlayVideo.pause();
  overlayVideo.src = '';
  overlayVideo.style.display = \"none\";
  document.body.style.overflow = '';
}

document.querySelectorAll('.gallery-img').forEach(media => {
  media.addEventListener('click', () => showOverlay(media));
  media.addEventListener('keydown', (e) => {
      if (e.key === 'Enter' || e.key === ' ') showOverlay(media);
  });
});

overlayBg.addEventListener('click', (e) => {
  if (e.target === overlayBg || e.target === overlayClose) hideOverlay();
});
overlayPanel.addEventListener('click', e => e.stopPropagation());
overlayImg.addEventListener('click', e => e.stopPropagation());
overlayVideo.addEventListener('click', e => e.stopPropagation());

document.addEventListener('keydown', (e) => {
  if (overlayBg.classList.contains('active') && e.key === 'Escape') hideOverlay();
});
</script>";
