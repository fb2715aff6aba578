use std::path::PathBuf;
use std::sync::Arc;

use colorizer_lib::output::{ColorizeOutput, ColorizeStatus, OUTPUT_VERSION};
use colorizer_lib::{
    save_remote_image_locally, AssetPicker, Capability, ColorizationPipeline, ColorizedImage,
    ColorizerOutput, ConfiguredPermissionGate, DeepAiClient, FilePicker, FirebaseStorage,
    PermissionGate, RealtimeDatabase, Result, SavedImage, SubmitOutcome, TcpProbe,
};

use super::{http_client, CommandEnv};
use crate::cli::PhotoSource;
use crate::settings::{log_effective_config, resolve_pipeline_options};

pub async fn run(
    env: &CommandEnv,
    input: Option<PathBuf>,
    source: PhotoSource,
    save: bool,
    colorize_timeout: Option<u64>,
) -> Result<ColorizerOutput> {
    let session = env.active_session().await?;
    let options = resolve_pipeline_options(colorize_timeout, &env.config)?;
    if env.globals.verbose {
        log_effective_config(&env.config, &options, env.config_path());
    }

    let gate = ConfiguredPermissionGate::new(
        env.config.permissions.camera,
        env.config.permissions.library,
    );
    let capability = match source {
        PhotoSource::Library => Capability::Library,
        PhotoSource::Camera => Capability::Camera,
    };
    if !gate.request(capability).await {
        return Ok(refusal(
            ColorizeStatus::Denied,
            format!("{capability} access was not granted."),
        ));
    }

    // The model client's own timeout must not cut the call before the deadline does.
    let mut model_config = env.config.clone();
    if let Some(deadline) = options.colorize_deadline {
        model_config.timeouts.colorize = deadline;
    }
    let pipeline = ColorizationPipeline::new(
        Arc::new(FirebaseStorage::from_config(&env.config)?),
        Arc::new(RealtimeDatabase::from_config(&env.config)?),
        Arc::new(DeepAiClient::from_config(&model_config, &env.credentials)?),
        Arc::new(TcpProbe::from_config(&env.config)),
        options,
    );

    let picker = FilePicker::new(input);
    let pick = match source {
        PhotoSource::Library => picker.pick_from_library().await?,
        PhotoSource::Camera => picker.capture_from_camera().await?,
    };

    let image = match pipeline.submit(&session, pick).await? {
        SubmitOutcome::Completed(image) => image,
        SubmitOutcome::Blocked(message) => return Ok(refusal(ColorizeStatus::Blocked, message)),
        SubmitOutcome::Cancelled => {
            return Ok(refusal(ColorizeStatus::Cancelled, "No photo selected.".into()))
        }
        SubmitOutcome::Ignored => {
            return Ok(refusal(
                ColorizeStatus::Ignored,
                "A colorization is already running.".into(),
            ))
        }
    };

    let (saved, message) = if save {
        match save_result(env, &gate, &image).await {
            Ok(saved) => (Some(saved), None),
            Err(message) => (None, Some(message)),
        }
    } else {
        (None, None)
    };

    Ok(ColorizerOutput::Colorize(ColorizeOutput {
        version: OUTPUT_VERSION.to_string(),
        status: ColorizeStatus::Completed,
        state: pipeline.state(),
        result: Some(image),
        saved,
        message,
    }))
}

/// The record already exists at this point, so saving problems are reported
/// alongside the result instead of failing the command.
async fn save_result(
    env: &CommandEnv,
    gate: &ConfiguredPermissionGate,
    image: &ColorizedImage,
) -> std::result::Result<SavedImage, String> {
    if !gate.request_library_access().await {
        return Err("Not saved: library access was not granted.".to_string());
    }
    let name = if image.id.is_empty() {
        image.record_key.as_str()
    } else {
        image.id.as_str()
    };
    let http = http_client(&env.config).map_err(|e| format!("Not saved: {e}"))?;
    save_remote_image_locally(
        &http,
        &image.image_url,
        name,
        &env.config.paths.documents_dir(),
        &env.config.paths.gallery_dir(),
    )
    .await
    .map_err(|e| {
        tracing::warn!(error = %e, "saving colorized image failed");
        format!("Not saved: {e}")
    })
}

fn refusal(status: ColorizeStatus, message: String) -> ColorizerOutput {
    ColorizerOutput::Colorize(ColorizeOutput {
        version: OUTPUT_VERSION.to_string(),
        status,
        state: colorizer_lib::PipelineState::Idle,
        result: None,
        saved: None,
        message: Some(message),
    })
}
