use std::sync::Arc;

use colorizer_lib::output::{DeleteOutput, ImagesOutput, SaveOutput, OUTPUT_VERSION};
use colorizer_lib::{
    save_remote_image_locally, Capability, ColorizerError, ColorizerOutput,
    ConfiguredPermissionGate, PermissionGate, RealtimeDatabase, RecordSnapshot, RecordStore,
    Result, SnapshotListener,
};

use super::{http_client, CommandEnv};
use crate::formatting::write_output;

pub async fn list(env: &CommandEnv) -> Result<ColorizerOutput> {
    let session = env.active_session().await?;
    let database = RealtimeDatabase::from_config(&env.config)?;
    let snapshot = database.list_image_records(&session).await?;
    Ok(ColorizerOutput::Images(ImagesOutput::from_snapshot(&snapshot)))
}

/// Prints the collection on every change until interrupted or the server ends the stream.
pub async fn watch(env: &CommandEnv) -> Result<()> {
    let session = env.active_session().await?;
    let database = RealtimeDatabase::from_config(&env.config)?;

    let format = env.globals.format;
    let output = env.globals.output.clone();
    let listener: SnapshotListener = Arc::new(move |snapshot: &RecordSnapshot| {
        let body = ColorizerOutput::Images(ImagesOutput::from_snapshot(snapshot));
        if let Err(e) = write_output(&body, format, output.as_deref()) {
            tracing::warn!(error = %e, "failed to write image list");
        }
    });

    let mut subscription = database
        .subscribe_to_image_records(&session, listener)
        .await?;
    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = subscription.closed() => false,
    };
    if !interrupted {
        return Err(ColorizerError::storage(
            None,
            "the image stream was closed by the server",
        ));
    }
    subscription.unsubscribe();
    Ok(())
}

pub async fn delete(env: &CommandEnv, key: String) -> Result<ColorizerOutput> {
    let session = env.active_session().await?;
    let database = RealtimeDatabase::from_config(&env.config)?;
    database.delete_image_record(&session, &key).await?;
    Ok(ColorizerOutput::Delete(DeleteOutput {
        version: OUTPUT_VERSION.to_string(),
        key,
    }))
}

pub async fn save(env: &CommandEnv, url: String, name: String) -> Result<ColorizerOutput> {
    let gate = ConfiguredPermissionGate::new(
        env.config.permissions.camera,
        env.config.permissions.library,
    );
    if !gate.request_library_access().await {
        return Err(ColorizerError::PermissionDenied(Capability::Library));
    }

    let http = http_client(&env.config)?;
    let saved = save_remote_image_locally(
        &http,
        &url,
        &name,
        &env.config.paths.documents_dir(),
        &env.config.paths.gallery_dir(),
    )
    .await?;
    Ok(ColorizerOutput::Save(SaveOutput {
        version: OUTPUT_VERSION.to_string(),
        saved,
    }))
}
