//! Per-cell glyph drawing.
//!
//! One closed dispatch over `DotShape`; every routine draws a glyph of the
//! given overall size centered on the cell. Concave glyphs are built from
//! convex fans or rectangle unions since the painter only fills convex paths.

use egui::{Color32, Painter, Pos2, Rect, Rounding, Shape, Stroke, TextureHandle, Vec2};
use std::f32::consts::{PI, TAU};

use crate::config::DotShape;

/// Loaded custom icon bitmaps, indexed by `DotShape::Custom(i)`.
#[derive(Default)]
pub struct IconLibrary {
    pub textures: Vec<Option<TextureHandle>>,
}

impl IconLibrary {
    pub fn get(&self, index: usize) -> Option<&TextureHandle> {
        self.textures.get(index).and_then(|t| t.as_ref())
    }
}

pub fn draw_glyph(
    painter: &Painter,
    shape: DotShape,
    center: Pos2,
    size: f32,
    color: Color32,
    background: Color32,
    icons: &IconLibrary,
) {
    if size <= 0.2 {
        return;
    }
    let half = size / 2.0;

    match shape {
        DotShape::RoundedRect => {
            let rect = Rect::from_center_size(center, Vec2::splat(size));
            painter.rect_filled(rect, Rounding::same(size * 0.3), color);
        }
        DotShape::Circle => {
            painter.circle_filled(center, half, color);
        }
        DotShape::Cross => {
            let th = size * 0.3;
            painter.rect_filled(
                Rect::from_center_size(center, Vec2::new(size, th)),
                Rounding::ZERO,
                color,
            );
            painter.rect_filled(
                Rect::from_center_size(center, Vec2::new(th, size)),
                Rounding::ZERO,
                color,
            );
        }
        DotShape::Triangle => {
            let pts = vec![
                center + Vec2::new(0.0, -size * 0.45),
                center + Vec2::new(-half, size * 0.45),
                center + Vec2::new(half, size * 0.45),
            ];
            painter.add(Shape::convex_polygon(pts, color, Stroke::NONE));
        }
        DotShape::Hexagon => {
            let pts: Vec<Pos2> = (0..6)
                .map(|i| center + Vec2::angled(i as f32 * TAU / 6.0 - PI / 6.0) * half)
                .collect();
            painter.add(Shape::convex_polygon(pts, color, Stroke::NONE));
        }
        DotShape::Star => {
            let pts: Vec<Pos2> = (0..10)
                .map(|i| {
                    let angle = -PI / 2.0 + i as f32 * PI / 5.0;
                    let r = if i % 2 == 0 { half } else { half * 0.5 };
                    center + Vec2::angled(angle) * r
                })
                .collect();
            fill_fan(painter, center, &pts, color);
        }
        DotShape::Heart => {
            // Parametric heart sampled into a fan around its interior.
            let s = size * 0.032;
            let pts: Vec<Pos2> = (0..24)
                .map(|i| {
                    let t = i as f32 / 24.0 * TAU;
                    let x = 16.0 * t.sin().powi(3) * s;
                    let y = -(13.0 * t.cos()
                        - 5.0 * (2.0 * t).cos()
                        - 2.0 * (3.0 * t).cos()
                        - (4.0 * t).cos())
                        * s;
                    center + Vec2::new(x, y)
                })
                .collect();
            fill_fan(painter, center + Vec2::new(0.0, size * 0.05), &pts, color);
        }
        DotShape::Music => {
            // Note head, stem and flag.
            let head = center + Vec2::new(-size * 0.15, size * 0.25);
            painter.circle_filled(head, size * 0.16, color);
            painter.rect_filled(
                Rect::from_min_size(
                    center + Vec2::new(-size * 0.02, -size * 0.45),
                    Vec2::new(size * 0.1, size * 0.7),
                ),
                Rounding::ZERO,
                color,
            );
            let flag = vec![
                center + Vec2::new(size * 0.05, -size * 0.45),
                center + Vec2::new(size * 0.4, -size * 0.2),
                center + Vec2::new(size * 0.4, -size * 0.05),
                center + Vec2::new(size * 0.05, -size * 0.3),
            ];
            painter.add(Shape::convex_polygon(flag, color, Stroke::NONE));
        }
        DotShape::Gear => {
            // Eight-tooth wheel; the hub hole is punched with the backdrop
            // color since the painter has no boolean subtraction.
            let outer = half;
            let tooth = size * 0.15;
            let teeth = 8;
            let pts: Vec<Pos2> = (0..teeth * 2)
                .map(|k| {
                    let angle = (k as f32 / 2.0) / teeth as f32 * TAU;
                    let r = if k % 2 == 0 { outer } else { outer - tooth };
                    center + Vec2::angled(angle) * r
                })
                .collect();
            fill_fan(painter, center, &pts, color);
            painter.circle_filled(center, size * 0.2, background);
        }
        DotShape::Question => {
            let stroke = Stroke::new((size * 0.12).max(1.0), color);
            let hook_center = center + Vec2::new(0.0, -size * 0.1);
            let r = size * 0.25;
            let arc: Vec<Pos2> = (0..=14)
                .map(|i| {
                    let a = PI * 0.8 + i as f32 / 14.0 * (PI * 1.4);
                    hook_center + Vec2::angled(a) * r
                })
                .collect();
            painter.add(Shape::line(arc, stroke));
            painter.line_segment(
                [
                    hook_center + Vec2::new(0.0, r),
                    hook_center + Vec2::new(0.0, size * 0.35),
                ],
                stroke,
            );
            painter.circle_filled(hook_center + Vec2::new(0.0, size * 0.5), size * 0.08, color);
        }
        DotShape::ErrorCross => {
            let th = size * 0.25;
            draw_rotated_bar(painter, center, size, th, PI / 4.0, color);
            draw_rotated_bar(painter, center, size, th, -PI / 4.0, color);
        }
        DotShape::Electric => {
            // Bolt as two overlapping convex strips.
            let p = |x: f32, y: f32| center + Vec2::new(x * size, y * size);
            painter.add(Shape::convex_polygon(
                vec![p(0.1, -0.5), p(-0.35, 0.05), p(0.1, 0.05), p(0.28, -0.18)],
                color,
                Stroke::NONE,
            ));
            painter.add(Shape::convex_polygon(
                vec![p(-0.1, 0.5), p(0.35, -0.05), p(-0.1, -0.05), p(-0.28, 0.18)],
                color,
                Stroke::NONE,
            ));
        }
        DotShape::Eye => {
            let stroke = Stroke::new((size * 0.08).max(1.0), color);
            let outline: Vec<Pos2> = (0..24)
                .map(|i| {
                    let a = i as f32 / 24.0 * TAU;
                    center + Vec2::new(a.cos() * half, a.sin() * size * 0.3)
                })
                .collect();
            painter.add(Shape::closed_line(outline, stroke));
            painter.circle_filled(center, size * 0.2, color);
        }
        DotShape::Logo => {
            // Four mirrored wing quads.
            let s = half;
            let g = s * 0.08;
            for (mx, my) in [(1.0, -1.0), (1.0, 1.0), (-1.0, -1.0), (-1.0, 1.0)] {
                let wing = vec![
                    center + Vec2::new(g * mx, g * my),
                    center + Vec2::new(s * 0.9 * mx, s * 0.45 * my),
                    center + Vec2::new(s * 0.45 * mx, g * my),
                ];
                painter.add(Shape::convex_polygon(wing, color, Stroke::NONE));
            }
        }
        DotShape::Custom(index) => match icons.get(index) {
            Some(texture) => {
                let rect = Rect::from_center_size(center, Vec2::splat(size));
                let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                painter.image(texture.id(), rect, uv, color);
            }
            None => {
                // Unloaded icon falls back to the default glyph.
                let rect = Rect::from_center_size(center, Vec2::splat(size));
                painter.rect_filled(rect, Rounding::same(size * 0.3), color);
            }
        },
    }
}

/// Fill a star-shaped outline by fanning triangles from an interior pivot.
fn fill_fan(painter: &Painter, pivot: Pos2, outline: &[Pos2], color: Color32) {
    for i in 0..outline.len() {
        let next = outline[(i + 1) % outline.len()];
        painter.add(Shape::convex_polygon(
            vec![pivot, outline[i], next],
            color,
            Stroke::NONE,
        ));
    }
}

fn draw_rotated_bar(
    painter: &Painter,
    center: Pos2,
    length: f32,
    thickness: f32,
    angle: f32,
    color: Color32,
) {
    let dir = Vec2::angled(angle);
    let normal = Vec2::new(-dir.y, dir.x);
    let l = length / 2.0;
    let t = thickness / 2.0;
    let pts = vec![
        center + dir * l + normal * t,
        center + dir * l - normal * t,
        center - dir * l - normal * t,
        center - dir * l + normal * t,
    ];
    painter.add(Shape::convex_polygon(pts, color, Stroke::NONE));
}
