//! Page coordinate translation for signature placement
//!
//! Fields arrive as fractions of the page measured from the top-left corner.
//! PDF user space has its origin at the bottom-left, so every field is
//! flipped, scaled to points and then shrunk to fit the signature image
//! without distortion.

use shared_types::{Field, PageSize, PlacementBox};

use crate::error::SignError;

/// Width-over-height ratio of a decoded image
pub fn aspect_ratio(pixel_width: u32, pixel_height: u32) -> Result<f64, SignError> {
    if pixel_width == 0 || pixel_height == 0 {
        return Err(SignError::DegenerateGeometry(format!(
            "image has zero size ({}x{} px)",
            pixel_width, pixel_height
        )));
    }
    Ok(pixel_width as f64 / pixel_height as f64)
}

/// Resolve a normalized field into the absolute box the image is drawn in.
///
/// The image is scaled to touch the field on one axis, never exceeds it on
/// the other, and is centered inside the field.
pub fn resolve(
    field: &Field,
    page: PageSize,
    image_aspect_ratio: f64,
) -> Result<PlacementBox, SignError> {
    if !image_aspect_ratio.is_finite() || image_aspect_ratio <= 0.0 {
        return Err(SignError::DegenerateGeometry(format!(
            "invalid image aspect ratio {}",
            image_aspect_ratio
        )));
    }

    let box_x = field.left_pct * page.width;
    let box_w = field.width_pct * page.width;
    let box_h = field.height_pct * page.height;
    let box_y = page.height * (1.0 - (field.top_pct + field.height_pct));

    // A zero-width box still yields a (zero-size) centered placement
    if box_h <= 0.0 {
        return Err(SignError::DegenerateGeometry(format!(
            "field on page {} has zero height ({} x {} pt)",
            field.page, box_w, box_h
        )));
    }

    let box_ratio = box_w / box_h;
    let (draw_w, draw_h) = if image_aspect_ratio > box_ratio {
        // Relatively wider than the box: width is the binding constraint
        (box_w, box_w / image_aspect_ratio)
    } else {
        (box_h * image_aspect_ratio, box_h)
    };

    Ok(PlacementBox {
        x: box_x + (box_w - draw_w) / 2.0,
        y: box_y + (box_h - draw_h) / 2.0,
        width: draw_w,
        height: draw_h,
    })
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const TOLERANCE: f64 = 1e-6;

    // ============================================================
    // Strategies
    // ============================================================

    fn page_size() -> impl Strategy<Value = PageSize> {
        prop_oneof![
            Just(PageSize::letter()),
            Just(PageSize::a4()),
            (50.0f64..3000.0, 50.0f64..3000.0)
                .prop_map(|(width, height)| PageSize { width, height }),
        ]
    }

    /// Fields that lie within the page and are at least 1% in each direction
    fn in_bounds_field() -> impl Strategy<Value = Field> {
        (0.01f64..=1.0, 0.01f64..=1.0)
            .prop_flat_map(|(width_pct, height_pct)| {
                (
                    0.0..=(1.0 - width_pct),
                    0.0..=(1.0 - height_pct),
                    Just(width_pct),
                    Just(height_pct),
                    1u32..20,
                )
            })
            .prop_map(|(left_pct, top_pct, width_pct, height_pct, page)| Field {
                page,
                left_pct,
                top_pct,
                width_pct,
                height_pct,
            })
    }

    fn image_ratio() -> impl Strategy<Value = f64> {
        (1u32..4000, 1u32..4000).prop_map(|(w, h)| w as f64 / h as f64)
    }

    // ============================================================
    // Placement Invariants
    // ============================================================

    proptest! {
        /// Property: the drawn image keeps the source aspect ratio
        #[test]
        fn aspect_ratio_is_preserved(
            field in in_bounds_field(),
            page in page_size(),
            ratio in image_ratio(),
        ) {
            let placed = resolve(&field, page, ratio).unwrap();
            let drawn = placed.width / placed.height;
            prop_assert!(
                ((drawn - ratio) / ratio).abs() < TOLERANCE,
                "drawn ratio {} differs from image ratio {}", drawn, ratio
            );
        }

        /// Property: the drawn image never exceeds the field box
        #[test]
        fn placement_is_contained(
            field in in_bounds_field(),
            page in page_size(),
            ratio in image_ratio(),
        ) {
            let placed = resolve(&field, page, ratio).unwrap();
            let box_w = field.width_pct * page.width;
            let box_h = field.height_pct * page.height;
            prop_assert!(placed.width <= box_w + TOLERANCE);
            prop_assert!(placed.height <= box_h + TOLERANCE);
        }

        /// Property: one axis always touches the box edges
        #[test]
        fn placement_fills_one_axis(
            field in in_bounds_field(),
            page in page_size(),
            ratio in image_ratio(),
        ) {
            let placed = resolve(&field, page, ratio).unwrap();
            let box_w = field.width_pct * page.width;
            let box_h = field.height_pct * page.height;
            let fills_width = (placed.width - box_w).abs() < TOLERANCE;
            let fills_height = (placed.height - box_h).abs() < TOLERANCE;
            prop_assert!(fills_width || fills_height);
        }

        /// Property: margins are symmetric on both axes
        #[test]
        fn placement_is_centered(
            field in in_bounds_field(),
            page in page_size(),
            ratio in image_ratio(),
        ) {
            let placed = resolve(&field, page, ratio).unwrap();
            let box_x = field.left_pct * page.width;
            let box_w = field.width_pct * page.width;
            let box_h = field.height_pct * page.height;
            let box_y = page.height * (1.0 - (field.top_pct + field.height_pct));

            let left = placed.x - box_x;
            let right = box_w - placed.width - left;
            let bottom = placed.y - box_y;
            let top = box_h - placed.height - bottom;

            prop_assert!((left - right).abs() < TOLERANCE);
            prop_assert!((bottom - top).abs() < TOLERANCE);
        }

        /// Property: in-bounds fields stay on the page after the origin flip
        #[test]
        fn placement_stays_on_page(
            field in in_bounds_field(),
            page in page_size(),
            ratio in image_ratio(),
        ) {
            let placed = resolve(&field, page, ratio).unwrap();
            prop_assert!(placed.x >= -TOLERANCE);
            prop_assert!(placed.y >= -TOLERANCE);
            prop_assert!(placed.x + placed.width <= page.width + TOLERANCE);
            prop_assert!(placed.y + placed.height <= page.height + TOLERANCE);
        }
    }
}
