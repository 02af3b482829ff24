//! Scene graph of model instances
//!
//! The scene graph owns editor-facing instances only. GPU-side models are
//! owned by the renderer and registered/unregistered separately; deleting an
//! instance here never touches device resources directly.

use std::collections::HashMap;
use std::sync::Arc;

use crate::assets::Model;
use crate::foundation::math::{compose_transform, Mat4, Vec3};

/// One placed model in the scene.
///
/// Holds a shared, read-only reference to its generic model template. The
/// transform is composed in the fixed engine order
/// (scale, rotate X/Y/Z, translate) by [`transform_matrix`].
///
/// [`transform_matrix`]: ModelInstance::transform_matrix
#[derive(Debug, Clone)]
pub struct ModelInstance {
    /// Scene-unique instance id
    pub id: u32,
    /// Display name shown in the editor
    pub name: String,
    /// Position
    pub position: Vec3,
    /// Euler rotation in degrees
    pub rotation: Vec3,
    /// Scale factors
    pub scale: Vec3,
    template: Arc<Model>,
}

impl ModelInstance {
    fn new(id: u32, name: String, template: Arc<Model>) -> Self {
        Self {
            id,
            name,
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
            template,
        }
    }

    /// The generic model this instance was created from
    pub fn template(&self) -> &Arc<Model> {
        &self.template
    }

    /// Compose the instance transform matrix
    pub fn transform_matrix(&self) -> Mat4 {
        compose_transform(self.position, self.rotation, self.scale)
    }
}

/// Registry of scene instances keyed by id.
///
/// Ids are assigned monotonically and never reused within one scene.
#[derive(Debug, Default)]
pub struct SceneGraph {
    instances: HashMap<u32, ModelInstance>,
    next_id: u32,
}

impl SceneGraph {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance created from a model template.
    ///
    /// The display name is the template name suffixed with the new id.
    pub fn add_instance(&mut self, template: Arc<Model>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        let name = format!("{} #{id}", template.name);
        self.instances.insert(id, ModelInstance::new(id, name, template));
        id
    }

    /// Clone an existing instance: new id, suffixed name, same transform and
    /// template. Returns the new id, or `None` if `id` is unknown.
    pub fn clone_instance(&mut self, id: u32) -> Option<u32> {
        let source = self.instances.get(&id)?.clone();

        let new_id = self.next_id;
        self.next_id += 1;

        let mut copy = source;
        copy.id = new_id;
        copy.name = format!("{} (copy #{new_id})", copy.name);
        self.instances.insert(new_id, copy);
        Some(new_id)
    }

    /// Delete an instance from the scene.
    ///
    /// Removes the id→instance entry only; the shared model template stays
    /// alive as long as any other instance or the application references it.
    /// Returns `false` when the id is unknown.
    pub fn delete_instance(&mut self, id: u32) -> bool {
        self.instances.remove(&id).is_some()
    }

    /// Look up an instance
    pub fn instance(&self, id: u32) -> Option<&ModelInstance> {
        self.instances.get(&id)
    }

    /// Mutable lookup, for editor transform changes
    pub fn instance_mut(&mut self, id: u32) -> Option<&mut ModelInstance> {
        self.instances.get_mut(&id)
    }

    /// All instances
    pub fn instances(&self) -> impl Iterator<Item = &ModelInstance> {
        self.instances.values()
    }

    /// Number of instances in the scene
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True when the scene holds no instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Arc<Model> {
        Arc::new(Model::new(7, "crate", "assets/crate", vec![], vec![]).unwrap())
    }

    #[test]
    fn ids_are_monotonic_and_names_suffixed() {
        let mut scene = SceneGraph::new();
        let a = scene.add_instance(template());
        let b = scene.add_instance(template());
        assert_eq!((a, b), (0, 1));
        assert_eq!(scene.instance(b).unwrap().name, "crate #1");
    }

    #[test]
    fn clone_copies_transform_and_shares_template() {
        let mut scene = SceneGraph::new();
        let id = scene.add_instance(template());
        scene.instance_mut(id).unwrap().position = Vec3::new(1.0, 2.0, 3.0);

        let clone_id = scene.clone_instance(id).unwrap();
        let original = scene.instance(id).unwrap();
        let clone = scene.instance(clone_id).unwrap();

        assert_ne!(clone.id, original.id);
        assert_eq!(clone.position, original.position);
        assert!(Arc::ptr_eq(clone.template(), original.template()));
    }

    #[test]
    fn delete_removes_instance_but_not_shared_template() {
        let mut scene = SceneGraph::new();
        let shared = template();
        let a = scene.add_instance(shared.clone());
        let b = scene.add_instance(shared.clone());

        assert!(scene.delete_instance(a));
        assert!(!scene.delete_instance(a));
        assert!(scene.instance(b).is_some());
        // one live instance + the local handle
        assert_eq!(Arc::strong_count(&shared), 2);
    }

    #[test]
    fn deleted_ids_are_never_reused() {
        let mut scene = SceneGraph::new();
        let a = scene.add_instance(template());
        scene.delete_instance(a);
        let b = scene.add_instance(template());
        assert_ne!(a, b);
    }
}
