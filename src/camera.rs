//! Finding, or provisioning, the camera that uploads are attached to.

use tracing::{info, warn};

use crate::client::{Client, Session};
use crate::errors::{IngestError, Result};
use crate::models::Camera;

/// Description stamped on cameras this tool creates.
pub const PSEUDO_CAMERA_DESCRIPTION: &str = "Pseudo Camera for Engine usage";

/// Name given to a pseudo camera created for `identifier`.
pub fn pseudo_camera_name(identifier: &str) -> String {
    format!("VideoSource Pseudo - {identifier}")
}

/// First camera whose name contains `identifier` (case-sensitive), in list order.
pub fn find_camera<'a>(cameras: &'a [Camera], identifier: &str) -> Option<&'a Camera> {
    cameras.iter().find(|c| c.name.contains(identifier))
}

/// Return the existing camera matching `identifier`, or create a pseudo
/// camera for it.
///
/// # Errors
///
/// - Any transport error from listing or creating.
/// - [`IngestError::NoCameraAvailable`] if creation returned nothing.
pub async fn resolve_camera(client: &Client, session: &Session, identifier: &str) -> Result<Camera> {
    let cameras = client.list_cameras(session).await?;

    if let Some(found) = find_camera(&cameras, identifier) {
        info!(camera_id = %found.camera_id, name = %found.name, "using existing camera");
        return Ok(found.clone());
    }

    info!(identifier, "no camera matching identifier, creating pseudo camera");
    let name = pseudo_camera_name(identifier);
    match client
        .create_pseudo_camera(session, &name, PSEUDO_CAMERA_DESCRIPTION)
        .await?
    {
        Some(camera) => {
            info!(camera_id = %camera.camera_id, name = %camera.name, "created pseudo camera");
            Ok(camera)
        }
        None => Err(IngestError::NoCameraAvailable {
            identifier: identifier.to_string(),
        }),
    }
}

/// Delete `camera`. Failures are logged and reported as `false`; deletion is
/// never retried.
pub async fn release_camera(client: &Client, session: &Session, camera: &Camera) -> bool {
    match client.delete_camera(session, &camera.camera_id).await {
        Ok(()) => {
            info!(camera_id = %camera.camera_id, "camera deleted");
            true
        }
        Err(e) => {
            warn!(camera_id = %camera.camera_id, error = %e, "failed to delete camera");
            false
        }
    }
}
