use std::collections::BTreeMap;
use std::sync::Arc;

use assetview_common::{Color, NodeId, Transform};
use glam::Mat4;

use crate::environment::{Environment, EnvironmentSource};
use crate::geometry::Geometry;
use crate::material::Material;

/// Errors from scene graph operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node {0:?} not found")]
    NodeNotFound(NodeId),
    #[error("node {0:?} is not a light")]
    NotALight(NodeId),
}

/// An event record produced by every mutation to the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    NodeAdded { id: NodeId, parent: Option<NodeId> },
    /// Node removed together with `descendants` children below it.
    NodeRemoved { id: NodeId, descendants: usize },
    EnvironmentSet {
        label: String,
        source: EnvironmentSource,
    },
    LightIntensityChanged { id: NodeId, old: f32, new: f32 },
    /// Environment intensity written to `materials` standard materials.
    EnvIntensityApplied { value: f32, materials: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Uniform light from every direction.
    Ambient,
    /// Omnidirectional light at the node's position.
    Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

impl Light {
    pub fn ambient(color: Color, intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color,
            intensity,
        }
    }

    pub fn point(color: Color, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub geometry: Arc<Geometry>,
    pub material: Material,
    /// Stand-in geometry inserted after a failed load.
    pub placeholder: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Light(Light),
    Mesh(MeshNode),
}

/// A node in the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn new(name: impl Into<String>, transform: Transform, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            transform,
            kind,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, Transform::default(), NodeKind::Group)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn as_light(&self) -> Option<&Light> {
        match &self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&MeshNode> {
        match &self.kind {
            NodeKind::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

/// The scene graph: nodes under an implicit root plus the active environment.
///
/// Node storage is a BTreeMap keyed by id; draw and traversal order come from
/// the ordered child lists, starting at the root.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, Node>,
    roots: Vec<NodeId>,
    environment: Option<Environment>,
    event_log: Vec<SceneEvent>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Direct children of the root, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Add a node as a child of the root.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId::new();
        self.insert(id, None, node);
        self.roots.push(id);
        id
    }

    /// Add a node below `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node) -> Result<NodeId, SceneError> {
        let id = NodeId::new();
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(SceneError::NodeNotFound(parent))?;
        parent_node.children.push(id);
        self.insert(id, Some(parent), node);
        Ok(id)
    }

    fn insert(&mut self, id: NodeId, parent: Option<NodeId>, mut node: Node) {
        node.parent = parent;
        node.children.clear();
        self.nodes.insert(id, node);
        self.event_log.push(SceneEvent::NodeAdded { id, parent });
    }

    /// Remove a node and its whole subtree. Returns the removed node.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        match node.parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
        let mut stack = node.children.clone();
        let mut descendants = 0;
        while let Some(child) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&child) {
                descendants += 1;
                stack.extend(removed.children);
            }
        }
        self.event_log
            .push(SceneEvent::NodeRemoved { id, descendants });
        Some(node)
    }

    /// Depth-first, pre-order walk over every node reachable from the root.
    pub fn traverse(&self, mut visit: impl FnMut(NodeId, &Node)) {
        for id in self.traversal_order() {
            if let Some(node) = self.nodes.get(&id) {
                visit(id, node);
            }
        }
    }

    /// Mutable variant of [`traverse`](Self::traverse).
    pub fn traverse_mut(&mut self, mut visit: impl FnMut(NodeId, &mut Node)) {
        for id in self.traversal_order() {
            if let Some(node) = self.nodes.get_mut(&id) {
                visit(id, node);
            }
        }
    }

    fn traversal_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                order.push(id);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        order
    }

    /// Accumulated transform from the root down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            matrix = node.transform.matrix() * matrix;
        }
        Some(matrix)
    }

    /// Every mesh node with its world matrix, in traversal order.
    pub fn meshes(&self) -> Vec<(NodeId, Mat4, &MeshNode)> {
        self.traversal_order()
            .into_iter()
            .filter_map(|id| {
                let mesh = self.nodes.get(&id)?.as_mesh()?;
                Some((id, self.world_matrix(id)?, mesh))
            })
            .collect()
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n.kind, NodeKind::Mesh(_)))
            .count()
    }

    /// Every light with its world-space position, in traversal order.
    pub fn lights(&self) -> Vec<(NodeId, glam::Vec3, Light)> {
        self.traversal_order()
            .into_iter()
            .filter_map(|id| {
                let light = *self.nodes.get(&id)?.as_light()?;
                let position = self.world_matrix(id)?.w_axis.truncate();
                Some((id, position, light))
            })
            .collect()
    }

    /// Write a light's intensity. Returns the previous value.
    pub fn set_light_intensity(&mut self, id: NodeId, intensity: f32) -> Result<f32, SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::NodeNotFound(id))?;
        let NodeKind::Light(light) = &mut node.kind else {
            return Err(SceneError::NotALight(id));
        };
        let old = light.intensity;
        light.intensity = intensity;
        self.event_log.push(SceneEvent::LightIntensityChanged {
            id,
            old,
            new: intensity,
        });
        Ok(old)
    }

    /// Walk the whole graph and set the environment intensity of every material
    /// that supports it. Returns how many materials were written.
    pub fn set_env_map_intensity(&mut self, value: f32) -> usize {
        let mut materials = 0;
        self.traverse_mut(|_, node| {
            if let NodeKind::Mesh(MeshNode {
                material: Material::Standard(m),
                ..
            }) = &mut node.kind
            {
                m.env_map_intensity = value;
                materials += 1;
            }
        });
        self.event_log
            .push(SceneEvent::EnvIntensityApplied { value, materials });
        materials
    }

    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    /// Replace the active environment. The most recent call wins.
    pub fn set_environment(&mut self, environment: Environment) {
        if let Some(previous) = &self.environment {
            tracing::debug!(
                previous = %previous.label,
                next = %environment.label,
                "environment replaced"
            );
        }
        self.event_log.push(SceneEvent::EnvironmentSet {
            label: environment.label.clone(),
            source: environment.source(),
        });
        self.environment = Some(environment);
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{EnvironmentMap, FloatImage};
    use crate::material::StandardMaterial;
    use glam::Vec3;

    fn mesh(material: Material) -> Node {
        Node::new(
            "mesh",
            Transform::default(),
            NodeKind::Mesh(MeshNode {
                geometry: Arc::new(Geometry::placeholder_cube()),
                material,
                placeholder: false,
            }),
        )
    }

    fn env(label: &str) -> Environment {
        Environment::new(
            label,
            EnvironmentMap::equirectangular(FloatImage::new(1, 1, vec![[1.0; 3]])),
        )
    }

    #[test]
    fn graph_starts_empty() {
        let g = SceneGraph::new();
        assert_eq!(g.node_count(), 0);
        assert!(g.environment().is_none());
    }

    #[test]
    fn add_and_remove_subtree() {
        let mut g = SceneGraph::new();
        let group = g.add(Node::group("asset"));
        let child = g.add_child(group, mesh(Material::default())).unwrap();
        g.add_child(child, Node::group("leaf")).unwrap();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.get(child).unwrap().parent(), Some(group));

        g.remove(group).unwrap();
        assert_eq!(g.node_count(), 0);
        assert!(g.roots().is_empty());
        assert!(matches!(
            g.events().last(),
            Some(SceneEvent::NodeRemoved { descendants: 2, .. })
        ));
    }

    #[test]
    fn add_child_to_missing_parent_fails() {
        let mut g = SceneGraph::new();
        let err = g.add_child(NodeId::new(), Node::group("x")).unwrap_err();
        assert!(matches!(err, SceneError::NodeNotFound(_)));
    }

    #[test]
    fn traversal_follows_insertion_order() {
        let mut g = SceneGraph::new();
        let a = g.add(Node::group("a"));
        let b = g.add(Node::group("b"));
        let a1 = g.add_child(a, Node::group("a1")).unwrap();
        let mut names = Vec::new();
        g.traverse(|_, n| names.push(n.name.clone()));
        assert_eq!(names, vec!["a", "a1", "b"]);
        assert!(g.get(a1).is_some() && g.get(b).is_some());
    }

    #[test]
    fn world_matrix_accumulates_parents() {
        let mut g = SceneGraph::new();
        let parent = g.add(Node::new(
            "p",
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            NodeKind::Group,
        ));
        let child = g
            .add_child(
                parent,
                Node::new(
                    "c",
                    Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
                    NodeKind::Group,
                ),
            )
            .unwrap();
        let m = g.world_matrix(child).unwrap();
        assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn light_intensity_update() {
        let mut g = SceneGraph::new();
        let id = g.add(Node::new(
            "point",
            Transform::from_position(Vec3::new(5.0, 5.0, 1.0)),
            NodeKind::Light(Light::point(Color::WHITE, 5.0)),
        ));
        assert_eq!(g.set_light_intensity(id, 7.5).unwrap(), 5.0);
        assert_eq!(g.get(id).unwrap().as_light().unwrap().intensity, 7.5);
        let lights = g.lights();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].1, Vec3::new(5.0, 5.0, 1.0));
    }

    #[test]
    fn light_intensity_on_non_light_fails() {
        let mut g = SceneGraph::new();
        let id = g.add(Node::group("g"));
        assert!(matches!(
            g.set_light_intensity(id, 1.0),
            Err(SceneError::NotALight(_))
        ));
    }

    #[test]
    fn env_intensity_reaches_nested_standard_materials_only() {
        let mut g = SceneGraph::new();
        let group = g.add(Node::group("asset"));
        let a = g
            .add_child(group, mesh(Material::Standard(StandardMaterial::default())))
            .unwrap();
        let b = g.add(mesh(Material::Standard(StandardMaterial::default())));
        let basic = g.add(mesh(Material::Basic {
            color: [1.0, 1.0, 1.0, 1.0],
        }));

        assert_eq!(g.set_env_map_intensity(5.0), 2);
        for id in [a, b] {
            let m = g.get(id).unwrap().as_mesh().unwrap();
            assert_eq!(m.material.env_map_intensity(), Some(5.0));
        }
        let m = g.get(basic).unwrap().as_mesh().unwrap();
        assert_eq!(m.material.env_map_intensity(), None);
    }

    #[test]
    fn last_environment_wins() {
        let mut g = SceneGraph::new();
        g.set_environment(env("first"));
        g.set_environment(env("second"));
        assert_eq!(g.environment().unwrap().label, "second");
        let events = g.drain_events();
        assert_eq!(events.len(), 2);
        assert!(g.events().is_empty());
    }

    #[test]
    fn meshes_listed_with_world_matrices() {
        let mut g = SceneGraph::new();
        g.add(Node::group("empty"));
        g.add(mesh(Material::default()));
        assert_eq!(g.mesh_count(), 1);
        assert_eq!(g.meshes().len(), 1);
    }
}
