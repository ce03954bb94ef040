//! Poll driver for pending create/update transitions.
//!
//! The controller's completion checks are single-shot; this module owns
//! the interval and the deadline. Dropping the returned future between
//! polls cancels the wait without retracting remote operations that were
//! already submitted.

use std::time::Duration;

use tokio::time::{interval, timeout};

use crate::client::ControlPlane;
use crate::controller::NetworkController;
use crate::error::{ControllerError, Result};

enum Pending {
    Create,
    Update,
}

async fn wait_built<C: ControlPlane>(
    controller: &mut NetworkController<C>,
    pending: Pending,
    every: Duration,
    deadline: Duration,
) -> Result<()> {
    let resource = controller.handle().unwrap_or("network").to_string();

    let poll_loop = async {
        let mut ticker = interval(every);
        loop {
            ticker.tick().await;
            let ready = match pending {
                Pending::Create => controller.poll_create_complete().await?,
                Pending::Update => controller.poll_update_complete().await?,
            };
            if ready {
                return Ok(());
            }
        }
    };

    let outcome = timeout(deadline, poll_loop).await;
    match outcome {
        Ok(result) => result,
        Err(_) => Err(ControllerError::Timeout { resource }),
    }
}

/// Poll a pending create every `every` until ready or `deadline` expires.
pub async fn wait_create_complete<C: ControlPlane>(
    controller: &mut NetworkController<C>,
    every: Duration,
    deadline: Duration,
) -> Result<()> {
    wait_built(controller, Pending::Create, every, deadline).await
}

/// Poll a pending update every `every` until ready or `deadline` expires.
pub async fn wait_update_complete<C: ControlPlane>(
    controller: &mut NetworkController<C>,
    every: Duration,
    deadline: Duration,
) -> Result<()> {
    wait_built(controller, Pending::Update, every, deadline).await
}
