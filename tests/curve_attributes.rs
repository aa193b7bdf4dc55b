//! Integration tests for curve attributes and segmented arrays.

use std::sync::Arc;

use geoset::attribute::{IndexMask, OffsetIndices, SegmentedView};
use geoset::prelude::*;

fn curve_with_counts(counts: &[usize]) -> GeometrySet {
    let splines = counts.iter().map(|&count| {
        let positions = (0..count).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        Spline::poly(positions)
    });
    GeometrySet::create_with_curve(Arc::new(CurveEval::from_splines(splines)), GeometryOwnershipType::Owned)
}

#[test]
fn test_point_to_curve_mean() {
    let mut geometry = curve_with_counts(&[2, 3]);
    let mut attributes = geometry
        .get_component_for_write::<CurveComponent>()
        .attributes_for_write()
        .unwrap();
    let values = AttributeInit::MoveArray(GArray::from_vec(vec![1.0f32, 3.0, 2.0, 2.0, 2.0]));
    assert!(attributes.add("value", AttrDomain::Point, DataType::Float, values));

    let curve = geometry.get_curve_for_read().unwrap();
    let per_curve = AttributeAccessor::new(curve)
        .lookup_typed::<f32>("value", Some(AttrDomain::Curve))
        .unwrap();
    assert_eq!(per_curve.domain, AttrDomain::Curve);
    assert_eq!(per_curve.varray.to_vec(), vec![2.0, 2.0]);
}

#[test]
fn test_point_to_curve_bool_all_true() {
    let mut geometry = curve_with_counts(&[2, 3]);
    let mut attributes = geometry
        .get_component_for_write::<CurveComponent>()
        .attributes_for_write()
        .unwrap();
    let flags = AttributeInit::MoveArray(GArray::from_vec(vec![true, true, true, false, true]));
    assert!(attributes.add("selected", AttrDomain::Point, DataType::Bool, flags));

    let curve = geometry.get_curve_for_read().unwrap();
    let accessor = AttributeAccessor::new(curve);
    let per_curve = accessor.lookup_on("selected", AttrDomain::Curve).unwrap();
    assert_eq!(per_curve.typed::<bool>().unwrap().to_vec(), vec![true, false]);

    // Broadcast back to points.
    let cyclic = accessor.lookup_or_default::<bool>("cyclic", AttrDomain::Point, true);
    assert_eq!(cyclic.to_vec(), vec![false; 5]);
}

#[test]
fn test_segmented_view_with_missing_segment() {
    let offsets = OffsetIndices::from_counts([2, 0, 3]);
    assert_eq!(offsets.as_slice(), &[0, 2, 2, 5]);

    let first = [1.0f32, 2.0];
    let last = [3.0f32, 4.0, 5.0];
    let view = SegmentedView::new(offsets, [Some(&first[..]), None, Some(&last[..])]);
    let varray = VArray::Segmented(view);
    assert_eq!(varray.to_vec(), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

    let mut masked = vec![0.0; 5];
    varray.materialize(&IndexMask::from_indices(vec![1, 3]), &mut masked);
    assert_eq!(masked, vec![0.0, 2.0, 0.0, 4.0, 0.0]);
}

#[test]
fn test_resolution_and_cyclic_builtins() {
    let curve = CurveEval::from_splines([
        Spline::poly(vec![Vec3::ZERO, Vec3::X]),
        Spline::nurbs(vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z]),
    ]);
    let mut geometry = GeometrySet::create_with_curve(Arc::new(curve), GeometryOwnershipType::Owned);
    let mut attributes = geometry
        .get_component_for_write::<CurveComponent>()
        .attributes_for_write()
        .unwrap();

    let mut resolution = attributes.lookup_for_write_typed::<i32>("resolution").unwrap();
    resolution.varray.set(1, 0);
    resolution.finish();
    let mut cyclic = attributes.lookup_for_write_typed::<bool>("cyclic").unwrap();
    cyclic.varray.set(0, true);
    cyclic.finish();

    let curve = geometry.get_curve_for_read().unwrap();
    assert_eq!(curve.splines()[1].resolution(), 1);
    assert!(curve.splines()[0].is_cyclic());
    assert!(!curve.splines()[1].is_cyclic());
}

#[test]
fn test_curve_with_empty_spline() {
    let mut geometry = curve_with_counts(&[2, 0, 3]);
    {
        let mut attributes = geometry
            .get_component_for_write::<CurveComponent>()
            .attributes_for_write()
            .unwrap();
        assert_eq!(attributes.domain_size(AttrDomain::Point), 5);
        assert_eq!(attributes.domain_size(AttrDomain::Curve), 3);
        let values = AttributeInit::MoveArray(GArray::from_vec(vec![1.0f32, 3.0, 2.0, 2.0, 2.0]));
        assert!(attributes.add("value", AttrDomain::Point, DataType::Float, values));
        let flags = AttributeInit::MoveArray(GArray::from_vec(vec![true, false, true, true, true]));
        assert!(attributes.add("selected", AttrDomain::Point, DataType::Bool, flags));
    }

    let curve = geometry.get_curve_for_read().unwrap();
    let accessor = AttributeAccessor::new(curve);
    let per_curve = accessor.lookup_or_default::<f32>("value", AttrDomain::Curve, -1.0);
    assert_eq!(per_curve.to_vec(), vec![2.0, 0.0, 2.0]);
    let selected = accessor.lookup_or_default::<bool>("selected", AttrDomain::Curve, false);
    assert_eq!(selected.to_vec(), vec![false, true, true]);

    let per_point = accessor.lookup_typed::<f32>("value", None).unwrap();
    assert_eq!(per_point.domain, AttrDomain::Point);
    assert_eq!(per_point.varray.to_vec(), vec![1.0, 3.0, 2.0, 2.0, 2.0]);
    let positions = accessor.lookup_typed::<Vec3>("position", None).unwrap();
    assert_eq!(positions.varray.get(1), Vec3::X);
    assert_eq!(positions.varray.get(4), Vec3::new(2.0, 0.0, 0.0));

    let bounds = geometry.compute_boundbox_without_instances().unwrap();
    assert_eq!(bounds.min, Vec3::ZERO);
    assert_eq!(bounds.max, Vec3::new(2.0, 0.0, 0.0));
}

#[test]
fn test_segmented_masked_materialize_to_uninitialized() {
    use std::mem::MaybeUninit;

    let offsets = OffsetIndices::from_counts([1, 2, 0, 2]);
    let a = [10i32];
    let b = [20i32, 21];
    let d = [40i32, 41];
    let view = SegmentedView::new(offsets, [Some(&a[..]), Some(&b[..]), None, Some(&d[..])]);
    let varray = VArray::Segmented(view);

    let mut dst = vec![MaybeUninit::new(-1); 5];
    varray.materialize_to_uninitialized(&IndexMask::from_indices(vec![4, 2, 0]), &mut dst);
    let values: Vec<i32> = dst.into_iter().map(|v| unsafe { v.assume_init() }).collect();
    assert_eq!(values, vec![10, -1, 21, -1, 41]);

    let mut dst = vec![0; 5];
    varray.materialize(&IndexMask::Range(1..4), &mut dst);
    assert_eq!(dst, vec![0, 20, 21, 40, 0]);
}
