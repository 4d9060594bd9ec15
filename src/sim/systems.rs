//! Systems that settle simulated editor state between ticks

use bevy::math::{Vec2, Vec3};
use bevy::prelude::*;

use crate::adapter::value_to_vec3;
use crate::constants::{DEFAULT_INSTANCE_SPACING, DEFAULT_POSITION_JITTER, MAX_AREA_CELLS};

use super::catalog::{
    ALTITUDE_FILTER, ALTITUDE_MAX, ALTITUDE_MIN, BOX_DIMENSIONS, BOX_SHAPE, FILTER_STAGE,
    INSTANCE_SPACING, LAYER_SPAWNER, MESH, MESH_HEIGHT, MESH_RADIUS, MESH_SURFACE,
    POSITION_MODIFIER, POSITION_X_RANGE, SHAPE_SURFACE,
};
use super::components::{AttachedComponents, Position, SettleRate, VegetationInstances};

/// Filter stage value that samples altitude after position modifiers
const POST_PROCESS: i64 = 2;

/// Ground an instance can be planted on
#[derive(Debug, Clone, Copy)]
pub enum Surface {
    /// Top face of a box
    Flat { min: Vec2, max: Vec2, top: f32 },
    /// Cone-shaped hill
    Hill { center: Vec2, base: f32, height: f32, radius: f32 },
}

impl Surface {
    fn altitude_at(&self, p: Vec2) -> Option<f32> {
        match *self {
            Surface::Flat { min, max, top } => {
                (p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y).then_some(top)
            }
            Surface::Hill {
                center,
                base,
                height,
                radius,
            } => {
                let dist = p.distance(center);
                (dist <= radius).then(|| base + height * (1.0 - dist / radius))
            }
        }
    }
}

/// Highest surface under a point
pub fn altitude_at(surfaces: &[Surface], p: Vec2) -> Option<f32> {
    surfaces
        .iter()
        .filter_map(|s| s.altitude_at(p))
        .fold(None, |best, alt| Some(best.map_or(alt, |b: f32| b.max(alt))))
}

fn box_dimensions(components: &AttachedComponents) -> Option<Vec3> {
    components
        .enabled(BOX_SHAPE)
        .and_then(|c| c.properties.get(BOX_DIMENSIONS))
        .and_then(value_to_vec3)
}

fn collect_surfaces<'a>(
    entities: impl Iterator<Item = (&'a Position, &'a AttachedComponents)>,
) -> Vec<Surface> {
    let mut surfaces = Vec::new();
    for (position, components) in entities {
        let p = position.0;
        if components.enabled(SHAPE_SURFACE).is_some() {
            if let Some(dims) = box_dimensions(components) {
                let half = dims.truncate() / 2.0;
                surfaces.push(Surface::Flat {
                    min: p.truncate() - half,
                    max: p.truncate() + half,
                    top: p.z + dims.z / 2.0,
                });
            }
        }
        if components.enabled(MESH_SURFACE).is_some() {
            if let Some(mesh) = components.enabled(MESH) {
                let height = mesh.f32_property(MESH_HEIGHT).unwrap_or(0.0);
                let radius = mesh.f32_property(MESH_RADIUS).unwrap_or(0.0);
                if radius > 0.0 {
                    surfaces.push(Surface::Hill {
                        center: p.truncate(),
                        base: p.z,
                        height,
                        radius,
                    });
                }
            }
        }
    }
    surfaces
}

/// Where instances of one vegetation area should end up.
///
/// Grid cells are `spacing` apart inside the area's box. An enabled position
/// modifier shifts each cell along X by +range / -range in a checkerboard.
/// The altitude filter samples before that shift unless its stage is
/// PostProcess. Cells without a surface underneath are dropped. Spacing is
/// widened when the grid would exceed `MAX_AREA_CELLS` cells.
pub fn placement_targets(
    position: Vec3,
    components: &AttachedComponents,
    surfaces: &[Surface],
) -> Vec<Vec2> {
    if components.enabled(LAYER_SPAWNER).is_none() {
        return Vec::new();
    }
    let Some(dims) = box_dimensions(components) else {
        return Vec::new();
    };
    let spacing = components
        .enabled(LAYER_SPAWNER)
        .and_then(|c| c.f32_property(INSTANCE_SPACING))
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(DEFAULT_INSTANCE_SPACING as f32);
    let area = (dims.x * dims.y).max(0.0);
    let spacing = spacing.max((area / MAX_AREA_CELLS as f32).sqrt());
    if !spacing.is_finite() {
        return Vec::new();
    }

    let jitter = components
        .enabled(POSITION_MODIFIER)
        .map(|c| {
            c.f32_property(POSITION_X_RANGE)
                .unwrap_or(DEFAULT_POSITION_JITTER as f32)
        });

    let filter = components.enabled(ALTITUDE_FILTER).map(|c| {
        let min = c.f32_property(ALTITUDE_MIN).unwrap_or(f32::MIN);
        let max = c.f32_property(ALTITUDE_MAX).unwrap_or(f32::MAX);
        let post = c.properties.get(FILTER_STAGE).and_then(|v| v.as_i64()) == Some(POST_PROCESS);
        (min, max, post)
    });

    let nx = ((dims.x / spacing).floor().max(0.0) as usize).min(MAX_AREA_CELLS);
    let ny = ((dims.y / spacing).floor().max(0.0) as usize).min(MAX_AREA_CELLS / nx.max(1));
    let origin = position.truncate() - dims.truncate() / 2.0;

    let mut points = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            let cell = origin + Vec2::new((i as f32 + 0.5) * spacing, (j as f32 + 0.5) * spacing);
            let placed = match jitter {
                Some(range) => {
                    let sign = if (i + j) % 2 == 0 { 1.0 } else { -1.0 };
                    cell + Vec2::new(sign * range, 0.0)
                }
                None => cell,
            };

            let Some(ground) = altitude_at(surfaces, placed) else {
                continue;
            };
            if let Some((min, max, post)) = filter {
                let sampled = if post {
                    ground
                } else {
                    match altitude_at(surfaces, cell) {
                        Some(alt) => alt,
                        None => continue,
                    }
                };
                if sampled < min || sampled > max {
                    continue;
                }
            }
            points.push(placed);
        }
    }
    points
}

/// Recompute where every vegetation area wants its instances
pub fn compute_placement_targets(
    mut areas: Query<(&Position, &AttachedComponents, &mut VegetationInstances)>,
    all: Query<(&Position, &AttachedComponents)>,
) {
    let surfaces = collect_surfaces(all.iter());
    for (position, components, mut instances) in &mut areas {
        let target = placement_targets(position.0, components, &surfaces);
        if target != instances.target {
            instances.placed = instances.placed.min(target.len());
            instances.target = target;
        }
    }
}

/// Move each area's placed count one step toward its target
pub fn settle_instances(rate: Res<SettleRate>, mut areas: Query<&mut VegetationInstances>) {
    for mut instances in &mut areas {
        let target = instances.target.len();
        if instances.placed < target {
            instances.placed = (instances.placed + rate.0).min(target);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{ComponentId, EntityId};
    use crate::sim::catalog::{ASSET_LIST, lookup};
    use crate::sim::components::AttachedComponent;
    use crate::sim::catalog::resolve_enabled;
    use serde_json::json;

    fn components(names: &[&str]) -> AttachedComponents {
        let mut list: Vec<AttachedComponent> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                AttachedComponent::new(
                    ComponentId {
                        entity: EntityId(1),
                        index: i as u64,
                    },
                    lookup(name).unwrap(),
                )
            })
            .collect();
        resolve_enabled(&mut list);
        AttachedComponents(list)
    }

    fn set(list: &mut AttachedComponents, type_name: &str, path: &str, value: serde_json::Value) {
        let component = list.0.iter_mut().find(|c| c.type_name == type_name).unwrap();
        component.properties.insert(path.to_string(), value);
    }

    fn flat_ground(size: f32, top: f32) -> Vec<Surface> {
        vec![Surface::Flat {
            min: Vec2::splat(-size),
            max: Vec2::splat(size),
            top,
        }]
    }

    #[test]
    fn test_hill_altitude() {
        let hill = Surface::Hill {
            center: Vec2::ZERO,
            base: 10.0,
            height: 20.0,
            radius: 10.0,
        };
        assert_eq!(hill.altitude_at(Vec2::ZERO), Some(30.0));
        assert_eq!(hill.altitude_at(Vec2::new(5.0, 0.0)), Some(20.0));
        assert_eq!(hill.altitude_at(Vec2::new(11.0, 0.0)), None);
    }

    #[test]
    fn test_grid_on_flat_surface() {
        let mut area = components(&[LAYER_SPAWNER, BOX_SHAPE, ASSET_LIST]);
        set(&mut area, BOX_SHAPE, BOX_DIMENSIONS, json!([16.0, 16.0, 16.0]));

        let points = placement_targets(Vec3::ZERO, &area, &flat_ground(100.0, 0.0));
        assert_eq!(points.len(), 16);
        assert!(points.contains(&Vec2::new(-6.0, -6.0)));
        assert!(points.contains(&Vec2::new(6.0, 6.0)));
    }

    #[test]
    fn test_tiny_spacing_is_coarsened() {
        let mut area = components(&[LAYER_SPAWNER, BOX_SHAPE, ASSET_LIST]);
        set(&mut area, BOX_SHAPE, BOX_DIMENSIONS, json!([100.0, 100.0, 16.0]));
        set(&mut area, LAYER_SPAWNER, INSTANCE_SPACING, json!(0.001));

        let points = placement_targets(Vec3::ZERO, &area, &flat_ground(100.0, 0.0));
        assert_eq!(points.len(), MAX_AREA_CELLS);

        set(&mut area, BOX_SHAPE, BOX_DIMENSIONS, json!([1.0e30, 1.0e30, 16.0]));
        let points = placement_targets(Vec3::ZERO, &area, &flat_ground(100.0, 0.0));
        assert!(points.len() <= MAX_AREA_CELLS);
    }

    #[test]
    fn test_no_surface_no_instances() {
        let mut area = components(&[LAYER_SPAWNER, BOX_SHAPE, ASSET_LIST]);
        set(&mut area, BOX_SHAPE, BOX_DIMENSIONS, json!([16.0, 16.0, 16.0]));
        assert!(placement_targets(Vec3::ZERO, &area, &[]).is_empty());
    }

    #[test]
    fn test_disabled_spawner_places_nothing() {
        let mut area = components(&[LAYER_SPAWNER, BOX_SHAPE]);
        set(&mut area, BOX_SHAPE, BOX_DIMENSIONS, json!([16.0, 16.0, 16.0]));
        assert!(placement_targets(Vec3::ZERO, &area, &flat_ground(100.0, 0.0)).is_empty());
    }

    #[test]
    fn test_altitude_filter_stage() {
        // Ground is 10 high for x < 0 and 30 high for x >= 0
        let surfaces = vec![
            Surface::Flat {
                min: Vec2::new(-50.0, -50.0),
                max: Vec2::new(-0.01, 50.0),
                top: 10.0,
            },
            Surface::Flat {
                min: Vec2::new(0.0, -50.0),
                max: Vec2::new(50.0, 50.0),
                top: 30.0,
            },
        ];
        let mut area = components(&[
            LAYER_SPAWNER,
            BOX_SHAPE,
            ASSET_LIST,
            ALTITUDE_FILTER,
            POSITION_MODIFIER,
        ]);
        set(&mut area, BOX_SHAPE, BOX_DIMENSIONS, json!([8.0, 4.0, 4.0]));
        set(&mut area, ALTITUDE_FILTER, ALTITUDE_MIN, json!(20.0));
        set(&mut area, ALTITUDE_FILTER, ALTITUDE_MAX, json!(40.0));
        set(&mut area, POSITION_MODIFIER, POSITION_X_RANGE, json!(3.0));

        // Cells at x = -2 and x = 2; the modifier moves them to x = 1 and x = -1
        set(&mut area, ALTITUDE_FILTER, FILTER_STAGE, json!(1));
        let pre = placement_targets(Vec3::ZERO, &area, &surfaces);
        assert_eq!(pre, vec![Vec2::new(-1.0, 0.0)]);

        set(&mut area, ALTITUDE_FILTER, FILTER_STAGE, json!(2));
        let post = placement_targets(Vec3::ZERO, &area, &surfaces);
        assert_eq!(post, vec![Vec2::new(1.0, 0.0)]);
    }
}
