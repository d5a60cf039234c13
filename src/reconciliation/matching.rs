//! Which observed containers count toward the desired replicas.

use crate::configuration::types::DesiredSpec;
use crate::engine_client::types::ContainerSummary;

/// Repository part of an image reference: the tag and any digest are dropped,
/// a registry port is kept.
///
/// ```
/// use dockside::reconciliation::matching::image_base;
///
/// assert_eq!(image_base("nginx:1.25"), "nginx");
/// assert_eq!(image_base("registry.local:5000/nginx"), "registry.local:5000/nginx");
/// assert_eq!(image_base("nginx@sha256:0123"), "nginx");
/// ```
pub fn image_base(image: &str) -> &str {
    let image = image.trim();
    let image = image.split_once('@').map_or(image, |(name, _)| name);
    match image.rfind(':') {
        Some(colon) if !image[colon..].contains('/') => &image[..colon],
        _ => image,
    }
}

/// The (image base, trimmed command) pair containers are grouped by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKey {
    image_base: String,
    command: String,
}

impl MatchKey {
    pub fn new(image: &str, command: &str) -> Self {
        MatchKey {
            image_base: image_base(image).to_string(),
            command: command.trim().to_string(),
        }
    }

    pub fn for_spec(spec: &DesiredSpec) -> Self {
        MatchKey::new(&spec.image, &spec.command)
    }

    pub fn matches(&self, summary: &ContainerSummary) -> bool {
        image_base(&summary.image) == self.image_base && summary.command.trim() == self.command
    }
}
