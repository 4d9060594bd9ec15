//! Component types known to the simulated editor
//!
//! Each type lists its default properties and its dependency groups. A
//! component is enabled only when every group has at least one enabled
//! component on the same entity.

use serde_json::{Map, Value, json};

use super::components::AttachedComponent;

/// Const-friendly default property value
#[derive(Debug, Clone, Copy)]
pub enum PropertyDefault {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(&'static str),
    Vec3([f64; 3]),
    /// Unset entity reference
    Null,
}

impl PropertyDefault {
    fn to_value(self) -> Value {
        match self {
            PropertyDefault::Float(v) => json!(v),
            PropertyDefault::Int(v) => json!(v),
            PropertyDefault::Bool(v) => json!(v),
            PropertyDefault::Text(v) => json!(v),
            PropertyDefault::Vec3(v) => json!(v),
            PropertyDefault::Null => Value::Null,
        }
    }
}

#[derive(Debug)]
pub struct ComponentSpec {
    pub name: &'static str,
    pub requires: &'static [&'static [&'static str]],
    pub properties: &'static [(&'static str, PropertyDefault)],
}

impl ComponentSpec {
    pub fn default_properties(&self) -> Map<String, Value> {
        self.properties
            .iter()
            .map(|(path, default)| (path.to_string(), default.to_value()))
            .collect()
    }
}

pub const BOX_SHAPE: &str = "Box Shape";
pub const SPHERE_SHAPE: &str = "Sphere Shape";
pub const MESH: &str = "Mesh";
pub const SHAPE_SURFACE: &str = "Shape Surface Tag Emitter";
pub const MESH_SURFACE: &str = "Mesh Surface Tag Emitter";
pub const LAYER_SPAWNER: &str = "Vegetation Layer Spawner";
pub const ASSET_LIST: &str = "Vegetation Asset List";
pub const ALTITUDE_FILTER: &str = "Vegetation Altitude Filter";
pub const POSITION_MODIFIER: &str = "Vegetation Position Modifier";
pub const GRADIENT_TRANSFORM: &str = "Gradient Transform Modifier";

pub const BOX_DIMENSIONS: &str = "Box Shape|Box Configuration|Dimensions";
pub const MESH_HEIGHT: &str = "Mesh|Height";
pub const MESH_RADIUS: &str = "Mesh|Radius";
pub const INSTANCE_SPACING: &str = "Configuration|Instance Spacing";
pub const ALTITUDE_MIN: &str = "Configuration|Altitude Min";
pub const ALTITUDE_MAX: &str = "Configuration|Altitude Max";
pub const FILTER_STAGE: &str = "Configuration|Filter Stage";
pub const POSITION_X_RANGE: &str = "Configuration|Position X|Range Max";

const SHAPES: &[&str] = &[BOX_SHAPE, SPHERE_SHAPE];

/// Anything that produces a gradient signal
const GRADIENT_PROVIDERS: &[&str] = &[
    "Dither Gradient Modifier",
    "Gradient Mixer",
    "Invert Gradient Modifier",
    "Levels Gradient Modifier",
    "Posterize Gradient Modifier",
    "Smooth-Step Gradient Modifier",
    "Threshold Gradient Modifier",
    "Altitude Gradient",
    "Constant Gradient",
    "FastNoise Gradient",
    "Image Gradient",
    "Perlin Noise Gradient",
    "Random Noise Gradient",
    "Reference Gradient",
    "Shape Falloff Gradient",
    "Slope Gradient",
    "Surface Mask Gradient",
];

const GRADIENT_INPUT: &[(&str, PropertyDefault)] =
    &[("Configuration|Gradient|Gradient Entity Id", PropertyDefault::Null)];
const NOISE: &[(&str, PropertyDefault)] = &[("Configuration|Random Seed", PropertyDefault::Int(1))];

pub static CATALOG: &[ComponentSpec] = &[
    ComponentSpec {
        name: BOX_SHAPE,
        requires: &[],
        properties: &[(BOX_DIMENSIONS, PropertyDefault::Vec3([1.0, 1.0, 1.0]))],
    },
    ComponentSpec {
        name: SPHERE_SHAPE,
        requires: &[],
        properties: &[("Sphere Shape|Sphere Configuration|Radius", PropertyDefault::Float(0.5))],
    },
    ComponentSpec {
        name: MESH,
        requires: &[],
        properties: &[
            (MESH_HEIGHT, PropertyDefault::Float(1.0)),
            (MESH_RADIUS, PropertyDefault::Float(1.0)),
            ("Mesh|Mesh Asset", PropertyDefault::Text("")),
        ],
    },
    ComponentSpec {
        name: SHAPE_SURFACE,
        requires: &[SHAPES],
        properties: &[("Configuration|Generated Tags", PropertyDefault::Text("terrain"))],
    },
    ComponentSpec {
        name: MESH_SURFACE,
        requires: &[&[MESH]],
        properties: &[("Configuration|Generated Tags", PropertyDefault::Text("terrain"))],
    },
    ComponentSpec {
        name: LAYER_SPAWNER,
        requires: &[SHAPES, &[ASSET_LIST]],
        properties: &[
            (INSTANCE_SPACING, PropertyDefault::Float(crate::constants::DEFAULT_INSTANCE_SPACING)),
            ("Configuration|Allow Emptying Instances", PropertyDefault::Bool(true)),
        ],
    },
    ComponentSpec {
        name: "Vegetation Layer Blocker",
        requires: &[SHAPES],
        properties: &[("Configuration|Inherit Behavior", PropertyDefault::Bool(true))],
    },
    ComponentSpec {
        name: "Vegetation Layer Blender",
        requires: &[SHAPES],
        properties: &[
            ("Configuration|Vegetation Areas|[0]", PropertyDefault::Null),
            ("Configuration|Vegetation Areas|[1]", PropertyDefault::Null),
        ],
    },
    ComponentSpec {
        name: ASSET_LIST,
        requires: &[],
        properties: &[("Configuration|Embedded Assets|[0]|Slice Asset", PropertyDefault::Text(""))],
    },
    ComponentSpec {
        name: ALTITUDE_FILTER,
        requires: &[&[LAYER_SPAWNER]],
        properties: &[
            (ALTITUDE_MIN, PropertyDefault::Float(0.0)),
            (ALTITUDE_MAX, PropertyDefault::Float(128.0)),
            (FILTER_STAGE, PropertyDefault::Int(0)),
        ],
    },
    ComponentSpec {
        name: POSITION_MODIFIER,
        requires: &[&[LAYER_SPAWNER]],
        properties: &[
            (POSITION_X_RANGE, PropertyDefault::Float(crate::constants::DEFAULT_POSITION_JITTER)),
            ("Configuration|Position X|Gradient|Gradient Entity Id", PropertyDefault::Null),
        ],
    },
    ComponentSpec {
        name: GRADIENT_TRANSFORM,
        requires: &[SHAPES],
        properties: &[("Configuration|Frequency Zoom", PropertyDefault::Float(1.0))],
    },
    ComponentSpec {
        name: "Gradient Surface Tag Emitter",
        requires: &[GRADIENT_PROVIDERS],
        properties: &[("Configuration|Threshold Min", PropertyDefault::Float(0.1))],
    },
    ComponentSpec { name: "Dither Gradient Modifier", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Gradient Mixer", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Invert Gradient Modifier", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Levels Gradient Modifier", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Posterize Gradient Modifier", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Smooth-Step Gradient Modifier", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Threshold Gradient Modifier", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Reference Gradient", requires: &[], properties: GRADIENT_INPUT },
    ComponentSpec { name: "Altitude Gradient", requires: &[], properties: &[] },
    ComponentSpec { name: "Slope Gradient", requires: &[], properties: &[] },
    ComponentSpec { name: "Surface Mask Gradient", requires: &[], properties: &[] },
    ComponentSpec { name: "Shape Falloff Gradient", requires: &[], properties: &[] },
    ComponentSpec {
        name: "Constant Gradient",
        requires: &[],
        properties: &[("Configuration|Value", PropertyDefault::Float(1.0))],
    },
    ComponentSpec { name: "FastNoise Gradient", requires: &[&[GRADIENT_TRANSFORM]], properties: NOISE },
    ComponentSpec { name: "Image Gradient", requires: &[&[GRADIENT_TRANSFORM]], properties: NOISE },
    ComponentSpec { name: "Perlin Noise Gradient", requires: &[&[GRADIENT_TRANSFORM]], properties: NOISE },
    ComponentSpec { name: "Random Noise Gradient", requires: &[&[GRADIENT_TRANSFORM]], properties: NOISE },
    ComponentSpec {
        name: "Comment",
        requires: &[],
        properties: &[("Configuration|Comment", PropertyDefault::Text(""))],
    },
];

pub fn lookup(name: &str) -> Option<&'static ComponentSpec> {
    CATALOG.iter().find(|spec| spec.name == name)
}

/// Recompute `enabled` for every component on one entity.
///
/// Starts from all-disabled and enables components whose dependency groups
/// are satisfied until nothing changes, so dependency cycles stay disabled.
pub fn resolve_enabled(components: &mut [AttachedComponent]) {
    for component in components.iter_mut() {
        component.enabled = false;
    }

    loop {
        let mut changed = false;
        for i in 0..components.len() {
            if components[i].enabled {
                continue;
            }
            let satisfied = match lookup(&components[i].type_name) {
                Some(spec) => spec.requires.iter().all(|group| {
                    components
                        .iter()
                        .any(|c| c.enabled && group.contains(&c.type_name.as_str()))
                }),
                None => false,
            };
            if satisfied {
                components[i].enabled = true;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ComponentId, EntityId};

    fn attach(names: &[&str]) -> Vec<AttachedComponent> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let spec = lookup(name).unwrap();
                AttachedComponent::new(
                    ComponentId {
                        entity: EntityId(1),
                        index: i as u64,
                    },
                    spec,
                )
            })
            .collect()
    }

    fn enabled(components: &[AttachedComponent]) -> Vec<bool> {
        components.iter().map(|c| c.enabled).collect()
    }

    #[test]
    fn test_emitter_disabled_without_gradient() {
        let mut list = attach(&["Gradient Surface Tag Emitter"]);
        resolve_enabled(&mut list);
        assert_eq!(enabled(&list), vec![false]);
    }

    #[test]
    fn test_emitter_enabled_by_constant_gradient() {
        let mut list = attach(&["Gradient Surface Tag Emitter", "Constant Gradient"]);
        resolve_enabled(&mut list);
        assert_eq!(enabled(&list), vec![true, true]);
    }

    #[test]
    fn test_noise_gradient_chain() {
        let mut list = attach(&["Gradient Surface Tag Emitter", "Random Noise Gradient"]);
        resolve_enabled(&mut list);
        assert_eq!(enabled(&list), vec![false, false]);

        let mut list = attach(&[
            "Gradient Surface Tag Emitter",
            "Random Noise Gradient",
            GRADIENT_TRANSFORM,
            BOX_SHAPE,
        ]);
        resolve_enabled(&mut list);
        assert_eq!(enabled(&list), vec![true, true, true, true]);
    }

    #[test]
    fn test_layer_spawner_needs_shape_and_assets() {
        let mut list = attach(&[LAYER_SPAWNER, BOX_SHAPE]);
        resolve_enabled(&mut list);
        assert_eq!(enabled(&list), vec![false, true]);

        let mut list = attach(&[LAYER_SPAWNER, BOX_SHAPE, ASSET_LIST, ALTITUDE_FILTER]);
        resolve_enabled(&mut list);
        assert_eq!(enabled(&list), vec![true, true, true, true]);
    }

    #[test]
    fn test_catalog_names_unique() {
        for (i, spec) in CATALOG.iter().enumerate() {
            assert!(
                CATALOG[i + 1..].iter().all(|other| other.name != spec.name),
                "duplicate catalog entry {}",
                spec.name
            );
        }
        assert!(GRADIENT_PROVIDERS.iter().all(|name| lookup(name).is_some()));
    }
}
