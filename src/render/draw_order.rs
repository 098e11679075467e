//! Front-to-back ordering of voxel objects

use hecs::Entity;

use crate::core::types::{UVec3, Vec3};
use crate::entity::{Pose, Registry, Transform, VoxelComponent};
use crate::math::Aabb;

/// Distance from `viewer` to an object's box, measured in the object's
/// local (unrotated, unscaled) space.
///
/// The box spans `[0, dimensions]` from the object's min corner, which is
/// also the rasterization pivot.
pub fn distance_to_viewer(pose: &Pose, dimensions: UVec3, viewer: Vec3) -> f32 {
    let local = pose.rotation.inverse() * (viewer - pose.position);
    Aabb::new(Vec3::ZERO, dimensions.as_vec3()).distance_to_point(local)
}

/// Refresh `distance` on every voxel object
pub fn update_distances(registry: &mut Registry, viewer: Vec3) {
    for (_, (transform, voxel)) in registry.query_mut::<(&Transform, &mut VoxelComponent)>() {
        voxel.distance = distance_to_viewer(&transform.pose(), voxel.voxel_data.dimensions(), viewer);
    }
}

/// Voxel objects sorted nearest first.
///
/// The sort is stable, so objects at equal distance keep registry order.
pub fn draw_order(registry: &Registry) -> Vec<Entity> {
    let mut objects: Vec<(Entity, f32)> = registry
        .query::<(&Transform, &VoxelComponent)>()
        .iter()
        .map(|(entity, (_, voxel))| (entity, voxel.distance))
        .collect();
    objects.sort_by(|a, b| a.1.total_cmp(&b.1));
    objects.into_iter().map(|(entity, _)| entity).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Quat;
    use crate::voxel::VoxelData;
    use std::sync::Arc;

    fn spawn_cube(registry: &mut Registry, position: Vec3) -> Entity {
        let data = Arc::new(VoxelData::filled(UVec3::ONE, 1));
        registry.spawn((Transform::from_position(position), VoxelComponent::new(data)))
    }

    #[test]
    fn test_distance_outside_box() {
        let pose = Pose {
            position: Vec3::new(5.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
        };
        let distance = distance_to_viewer(&pose, UVec3::new(2, 2, 2), Vec3::ZERO);
        assert!((distance - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_distance_inside_box_is_zero() {
        let pose = Pose::default();
        let distance = distance_to_viewer(&pose, UVec3::splat(4), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(distance, 0.0);
    }

    #[test]
    fn test_distance_uses_local_space() {
        // 90 degrees about Y lays the object's +X along world -Z
        let pose = Pose {
            position: Vec3::ZERO,
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        };
        let distance = distance_to_viewer(&pose, UVec3::new(4, 1, 1), Vec3::new(0.0, 0.0, -10.0));
        assert!((distance - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_draw_order_nearest_first() {
        let mut registry = Registry::new();
        let far = spawn_cube(&mut registry, Vec3::new(5.0, 0.0, 0.0));
        let near = spawn_cube(&mut registry, Vec3::new(1.0, 0.0, 0.0));
        let middle = spawn_cube(&mut registry, Vec3::new(3.0, 0.0, 0.0));

        update_distances(&mut registry, Vec3::ZERO);
        let distances: Vec<f32> = [far, near, middle]
            .iter()
            .map(|e| registry.get::<&VoxelComponent>(*e).unwrap().distance)
            .collect();
        assert_eq!(distances, vec![5.0, 1.0, 3.0]);

        assert_eq!(draw_order(&registry), vec![near, middle, far]);
    }

    #[test]
    fn test_draw_order_follows_viewer() {
        let mut registry = Registry::new();
        let a = spawn_cube(&mut registry, Vec3::new(-4.0, 0.0, 0.0));
        let b = spawn_cube(&mut registry, Vec3::new(4.0, 0.0, 0.0));

        update_distances(&mut registry, Vec3::new(-10.0, 0.0, 0.0));
        assert_eq!(draw_order(&registry), vec![a, b]);

        update_distances(&mut registry, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(draw_order(&registry), vec![b, a]);
    }
}
