//! Shared scaffolding for the kinds that register a boundary in the
//! object store without driving a gateway side effect. Their spec is
//! not interpreted by the engine, so it stays an opaque JSON value; the
//! reconciler only walks the phase lattice `Pending -> Running` once.

use async_trait::async_trait;

use crate::svc::{
    reconciler::{ReconcileError, Reconciler},
    resource::{Metadata, Phase, Resource, Status},
};

/// Generates a `$name` resource struct plus a `$name`-prefixed
/// passthrough reconciler. `$kind_tag` feeds `Resource::KIND_TAG`.
macro_rules! define_opaque_kind {
    ($name:ident, $reconciler:ident, $kind_tag:expr) => {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Clone, Debug)]
        pub struct $name {
            #[serde(flatten)]
            pub metadata: Metadata,
            #[serde(rename = "spec", default)]
            pub spec: serde_json::Value,
            #[serde(rename = "status", default)]
            pub status: Status,
        }

        impl Resource for $name {
            const KIND_TAG: &'static str = $kind_tag;

            fn metadata(&self) -> &Metadata {
                &self.metadata
            }
            fn metadata_mut(&mut self) -> &mut Metadata {
                &mut self.metadata
            }
            fn status(&self) -> &Status {
                &self.status
            }
            fn status_mut(&mut self) -> &mut Status {
                &mut self.status
            }
        }

        #[derive(Clone, Copy, Debug, Default)]
        pub struct $reconciler;

        #[async_trait]
        impl Reconciler<$name> for $reconciler {
            async fn reconcile(&self, obj: &mut $name) -> Result<(), ReconcileError> {
                if obj.deleted() {
                    obj.status.transition(Phase::Deleted, None);
                    return Ok(());
                }

                if obj.status.phase.is_none() || obj.status.phase == Some(Phase::Pending) {
                    obj.status.transition(Phase::Running, None);
                }

                Ok(())
            }
        }
    };
}

pub(crate) use define_opaque_kind;

#[cfg(test)]
mod tests {
    use super::*;

    define_opaque_kind!(Widget, WidgetReconciler, "widget");

    fn widget() -> Widget {
        Widget {
            metadata: Metadata {
                id: 1,
                name: "w".into(),
                workspace: "default".into(),
                labels: Default::default(),
                annotations: Default::default(),
                kind: "widget".into(),
                api_version: "v1".into(),
                creation_timestamp: String::new(),
                update_timestamp: String::new(),
                deletion_timestamp: String::new(),
            },
            spec: serde_json::json!({}),
            status: Status::default(),
        }
    }

    #[tokio::test]
    async fn pending_resource_transitions_to_running() {
        let mut obj = widget();

        WidgetReconciler.reconcile(&mut obj).await.unwrap();

        assert_eq!(obj.status.phase, Some(Phase::Running));
    }

    #[tokio::test]
    async fn running_resource_is_left_unchanged() {
        let mut obj = widget();
        obj.status.transition(Phase::Running, None);
        let transitioned_at = obj.status.last_transition_time.clone();

        WidgetReconciler.reconcile(&mut obj).await.unwrap();

        assert_eq!(obj.status.phase, Some(Phase::Running));
        assert_eq!(obj.status.last_transition_time, transitioned_at);
    }

    #[tokio::test]
    async fn deleted_resource_transitions_to_deleted_regardless_of_prior_phase() {
        let mut obj = widget();
        obj.metadata.deletion_timestamp = "2026-01-01T00:00:00Z".into();

        WidgetReconciler.reconcile(&mut obj).await.unwrap();

        assert_eq!(obj.status.phase, Some(Phase::Deleted));
    }
}
