use crate::layout::{AnchorView, LineView, MarkerView, ScreenFrame};
use crate::text::TextBlock;
use std::fmt::Write;

pub struct SvgRenderer {
    /// Text band height as a share of the map height
    text_band: f64,
    anchor_radius: f64,
    border_width: f64,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self {
            text_band: 0.17,
            anchor_radius: 10.0,
            border_width: 4.0,
        }
    }
}

impl SvgRenderer {
    /// Poster preview: the map frame with the text block underneath.
    pub fn render(&self, frame: &ScreenFrame, text: &TextBlock) -> String {
        let mut svg = String::new();
        let width = frame.container.width;
        let map_h = frame.container.height;
        let band_h = (map_h * self.text_band).round();
        let height = map_h + band_h;

        writeln!(
            &mut svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">"#,
            width, height, width, height
        )
        .unwrap();

        writeln!(
            &mut svg,
            r#"<style>
  .map {{ fill: #f2efe9; }}
  .band {{ fill: #fff; }}
  .line {{ stroke: #333; stroke-width: 2; stroke-dasharray: 6 4; fill: none; }}
  .marker-border {{ fill: none; stroke: #fff; }}
  .marker-active {{ stroke: #2563eb; }}
  .anchor-selected {{ fill: none; stroke: #2563eb; stroke-width: 2; }}
  .headline {{ font-family: serif; font-size: 48px; }}
  .divider {{ font-family: sans-serif; font-size: 20px; letter-spacing: 4px; }}
  .tagline {{ font-family: sans-serif; font-size: 14px; fill: #555; }}
</style>"#
        )
        .unwrap();

        writeln!(
            &mut svg,
            r#"<clipPath id="map-clip"><rect x="0" y="0" width="{}" height="{}" /></clipPath>"#,
            width, map_h
        )
        .unwrap();
        writeln!(
            &mut svg,
            r#"<rect class="map" x="0" y="0" width="{}" height="{}" />"#,
            width, map_h
        )
        .unwrap();

        writeln!(&mut svg, r#"<g clip-path="url(#map-clip)">"#).unwrap();
        // Lines sit under everything they connect
        for line in &frame.lines {
            self.render_line(&mut svg, line);
        }
        for anchor in &frame.anchors {
            self.render_anchor(&mut svg, anchor);
        }
        for marker in &frame.markers {
            self.render_marker(&mut svg, marker);
        }
        writeln!(&mut svg, "</g>").unwrap();

        self.render_text(&mut svg, text, width, map_h, band_h);

        writeln!(&mut svg, "</svg>").unwrap();
        svg
    }

    fn render_line(&self, svg: &mut String, line: &LineView) {
        writeln!(
            svg,
            r#"<line class="line" id="{}" x1="{}" y1="{}" x2="{}" y2="{}" />"#,
            line.id.line_key(),
            line.from.x,
            line.from.y,
            line.to.x,
            line.to.y
        )
        .unwrap();
    }

    fn render_anchor(&self, svg: &mut String, anchor: &AnchorView) {
        let color = anchor.color.hex();
        let fill = if anchor.filled { color } else { "none" };
        writeln!(
            svg,
            r#"<circle id="{}" cx="{}" cy="{}" r="{}" fill="{}" stroke="{}" stroke-width="2"><title>{}</title></circle>"#,
            anchor.id.anchor_key(),
            anchor.position.x,
            anchor.position.y,
            self.anchor_radius,
            fill,
            color,
            anchor.icon.id()
        )
        .unwrap();

        if anchor.selected {
            writeln!(
                svg,
                r#"<circle class="anchor-selected" cx="{}" cy="{}" r="{}" />"#,
                anchor.position.x,
                anchor.position.y,
                self.anchor_radius + 4.0
            )
            .unwrap();
        }
    }

    fn render_marker(&self, svg: &mut String, marker: &MarkerView) {
        let x = marker.center.x - marker.size.width / 2.0;
        let y = marker.center.y - marker.size.height / 2.0;

        // 1. Photo
        writeln!(
            svg,
            r#"<image id="{}" x="{}" y="{}" width="{}" height="{}" href="{}" preserveAspectRatio="xMidYMid slice" />"#,
            marker.id.marker_key(),
            x,
            y,
            marker.size.width,
            marker.size.height,
            escape_xml(&marker.image_ref)
        )
        .unwrap();

        // 2. Border on top
        let class = if marker.active {
            "marker-border marker-active"
        } else {
            "marker-border"
        };
        writeln!(
            svg,
            r#"<rect class="{}" x="{}" y="{}" width="{}" height="{}" stroke-width="{}" />"#,
            class, x, y, marker.size.width, marker.size.height, self.border_width
        )
        .unwrap();
    }

    fn render_text(&self, svg: &mut String, text: &TextBlock, width: f64, top: f64, band_h: f64) {
        let mid_x = width / 2.0;
        writeln!(
            svg,
            r#"<rect class="band" x="0" y="{}" width="{}" height="{}" />"#,
            top, width, band_h
        )
        .unwrap();

        let lines = [
            ("headline", &text.headline, 0.42),
            ("divider", &text.divider, 0.66),
            ("tagline", &text.tagline, 0.86),
        ];
        for (class, value, at) in lines {
            writeln!(
                svg,
                r#"<text class="{}" x="{}" y="{}" text-anchor="middle">{}</text>"#,
                class,
                mid_x,
                top + band_h * at,
                escape_xml(value)
            )
            .unwrap();
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{LngLat, Size};
    use crate::layout::{AnchorIcon, ItemId, LayoutGraph, PhotoId, Placement};
    use crate::map::{MapService, OfflineMap};

    fn frame(anchor_removed: bool) -> ScreenFrame {
        let mut map = OfflineMap::new(Size::new(900.0, 1260.0), 512.0);
        map.jump_to(LngLat::new(0.0, 0.0), 10.0);
        let mut graph = LayoutGraph::default();
        graph.commit_placement(vec![Placement {
            photo_id: PhotoId(1),
            image_ref: "blob:http://localhost/a&b".into(),
            anchor: LngLat::new(0.0, 0.0),
            adjusted: LngLat::new(0.1, 0.1),
            size: Size::new(200.0, 100.0),
        }]);
        graph.select_marker(ItemId(1)).unwrap();
        if anchor_removed {
            graph.remove_anchor(ItemId(1)).unwrap();
        }
        graph.reconcile_lines(&mut map);
        ScreenFrame::project(&graph, &map)
    }

    #[test]
    fn test_render_poster() {
        let svg = SvgRenderer::default().render(&frame(false), &TextBlock::default());

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains(r#"height="1474""#));
        assert!(svg.contains(r#"id="line-1""#));
        assert!(svg.contains(r##"fill="#BD3D2F""##));
        assert!(svg.contains(&format!("<title>{}</title>", AnchorIcon::Heart.id())));
        assert!(svg.contains("marker-active"));
        assert!(svg.contains("a&amp;b"));
        assert!(svg.contains(">Headline</text>"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_draw_order() {
        let svg = SvgRenderer::default().render(&frame(false), &TextBlock::default());
        let line = svg.find("<line").unwrap();
        let anchor = svg.find("<circle").unwrap();
        let image = svg.find("<image").unwrap();
        assert!(line < anchor && anchor < image);
    }

    #[test]
    fn test_marker_without_anchor() {
        let svg = SvgRenderer::default().render(&frame(true), &TextBlock::default());
        assert!(svg.contains(r#"id="marker-1""#));
        assert!(!svg.contains("<line"));
        assert!(!svg.contains("<circle"));
    }
}
