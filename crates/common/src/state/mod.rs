mod id;
mod node;

pub use id::NodeId;
pub use node::{AutoscalerStats, Node};

/// A notification from the model store that one of its nodes changed.
///
/// The control-plane binary turns these into `verify`/`shutdown` requests
/// (see `ModelStore::subscribe` in `fleet-supervisor::model`); this type
/// lives in `fleet-common` because both the model-store adapter and the
/// reconciler need to agree on its shape.
#[derive(Debug, Clone)]
pub enum ModelChange {
    Created(Node),
    Updated(Node),
    Deleted(Node),
}
