//! Pod placement policy
//!
//! Affinity and toleration settings for the gateway pods. Loaded from the
//! cluster definition (YAML) and applied to the pod spec as-is.

use k8s_openapi::api::core::v1::{
    Affinity, NodeAffinity, PodAffinity, PodAntiAffinity, PodSpec, Toleration,
};
use serde::{Deserialize, Serialize};

/// Where gateway pods may be scheduled
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Node affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_affinity: Option<NodeAffinity>,
    /// Pod affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_affinity: Option<PodAffinity>,
    /// Pod anti-affinity rules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_anti_affinity: Option<PodAntiAffinity>,
    /// Taints the pods tolerate
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,
}

impl Placement {
    /// Whether this placement sets no constraints at all
    pub fn is_empty(&self) -> bool {
        self.node_affinity.is_none()
            && self.pod_affinity.is_none()
            && self.pod_anti_affinity.is_none()
            && self.tolerations.is_empty()
    }

    /// Apply the placement to a pod spec
    ///
    /// Only fields set on the placement are written; an empty placement leaves
    /// the pod spec untouched.
    pub fn apply_to_pod_spec(&self, spec: &mut PodSpec) {
        if self.is_empty() {
            return;
        }
        if self.node_affinity.is_some()
            || self.pod_affinity.is_some()
            || self.pod_anti_affinity.is_some()
        {
            spec.affinity = Some(Affinity {
                node_affinity: self.node_affinity.clone(),
                pod_affinity: self.pod_affinity.clone(),
                pod_anti_affinity: self.pod_anti_affinity.clone(),
            });
        }
        if !self.tolerations.is_empty() {
            spec.tolerations = Some(self.tolerations.clone());
        }
    }
}
