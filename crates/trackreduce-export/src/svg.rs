//! SVG export serializer.
//!
//! Converts geographic polylines into an SVG string with `<path>`
//! elements using the [`svg`] crate for document construction, XML
//! escaping, and path data formatting.
//!
//! Every layer is projected to Web Mercator and the union of their
//! bounds is fitted, aspect preserved, into a square viewBox of
//! [`DOCUMENT_SIZE`] units with north up. Each layer becomes one
//! `<path>` using `M` (move to) and `L` (line to) commands, optionally
//! followed by a `<circle>` marker on every vertex.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and a namespaced
//! `<metadata>` element carrying the reduction config as JSON.
//!
//! This is a pure function with no I/O: it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Circle, Description, Element, Group, Path, Title};
use svg::node::{Node, Text, Value};

use trackreduce_pipeline::projection::project_polyline;
use trackreduce_pipeline::{Bound, Point, Polyline};

/// Width and height of the viewBox.
pub const DOCUMENT_SIZE: f64 = 1000.0;

/// Blank border kept around the fitted traces, in viewBox units.
pub const MARGIN: f64 = 20.0;

/// Namespace of the `<trackreduce:config>` metadata element.
const METADATA_NAMESPACE: &str = "https://github.com/trackreduce/trackreduce/ns/1";

/// Metadata to embed in the SVG document.
///
/// All fields are optional. Text values are XML-escaped automatically
/// by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the trace filename without extension.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`ReduceConfig`](trackreduce_pipeline::ReduceConfig),
    /// emitted inside `<metadata>` wrapped in a namespaced
    /// `<trackreduce:config>` element so exported files carry
    /// machine-parseable settings.
    pub config_json: Option<&'a str>,
}

/// One geographic polyline and how to draw it.
#[derive(Debug, Clone, Copy)]
pub struct SvgLayer<'a> {
    /// The trace, `x` = longitude and `y` = latitude in degrees.
    pub polyline: &'a Polyline,
    /// Stroke colour, any SVG paint value.
    pub stroke: &'a str,
    /// Stroke width in viewBox units.
    pub stroke_width: f64,
    /// Radius of a vertex marker, or `None` for no markers.
    pub marker_radius: Option<f64>,
}

impl<'a> SvgLayer<'a> {
    /// A plain line layer without vertex markers.
    #[must_use]
    pub const fn line(polyline: &'a Polyline, stroke: &'a str, stroke_width: f64) -> Self {
        Self {
            polyline,
            stroke,
            stroke_width,
            marker_radius: None,
        }
    }

    /// Add a marker of `radius` on every vertex.
    #[must_use]
    pub const fn with_markers(mut self, radius: f64) -> Self {
        self.marker_radius = Some(radius);
        self
    }
}

/// Build an SVG path `d` attribute string from a polyline.
///
/// Uses `M` for the first point and `L` for subsequent points.
/// Returns an empty string for polylines with fewer than 2 points.
///
/// Coordinates are formatted by the [`svg`] crate using `f32` precision,
/// which is plenty once traces are fitted into the viewBox.
///
/// # Examples
///
/// ```
/// use trackreduce_pipeline::{Point, Polyline};
/// use trackreduce_export::build_path_data;
///
/// let polyline = Polyline::new(vec![
///     Point::new(10.0, 20.0),
///     Point::new(30.0, 40.0),
/// ]);
/// let d = build_path_data(&polyline);
/// assert_eq!(d, "M10,20 L30,40");
/// ```
#[must_use]
pub fn build_path_data(polyline: &Polyline) -> String {
    let points = polyline.points();
    if points.len() < 2 {
        return String::new();
    }

    let first = &points[0];
    let mut data = Data::new().move_to((first.x, first.y));
    for p in &points[1..] {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data))
}

/// Uniform scale-and-translate from planar meters into the viewBox,
/// flipping y so that north is up.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewport {
    min: Point,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    /// Fit `bound` into the area inside [`MARGIN`], centred.
    fn fit(bound: Bound) -> Self {
        let inner = 2.0f64.mul_add(-MARGIN, DOCUMENT_SIZE);
        let span = bound.width().max(bound.height());
        let scale = if span > 0.0 { inner / span } else { 1.0 };
        Self {
            min: bound.min,
            scale,
            offset_x: bound.width().mul_add(-scale, inner) / 2.0 + MARGIN,
            offset_y: bound.height().mul_add(-scale, inner) / 2.0 + MARGIN,
        }
    }

    fn apply(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.min.x).mul_add(self.scale, self.offset_x),
            DOCUMENT_SIZE - (p.y - self.min.y).mul_add(self.scale, self.offset_y),
        )
    }

    fn apply_polyline(&self, polyline: &Polyline) -> Polyline {
        polyline.points().iter().map(|&p| self.apply(p)).collect()
    }
}

/// Render geographic polylines as an SVG document.
///
/// Layers are drawn in order, so later layers appear on top. Empty
/// layers contribute nothing to the fitted bound; layers with fewer
/// than 2 points draw no path but still get markers. With no drawable
/// points at all the document is empty but valid.
#[must_use]
pub fn to_svg(layers: &[SvgLayer<'_>], metadata: &SvgMetadata<'_>) -> String {
    let projected: Vec<Polyline> = layers
        .iter()
        .map(|layer| project_polyline(layer.polyline))
        .collect();
    let bound = projected
        .iter()
        .filter_map(Polyline::bound)
        .reduce(|a, b| a.union(&b));

    let mut doc = Document::new()
        .set("width", DOCUMENT_SIZE)
        .set("height", DOCUMENT_SIZE)
        .set("viewBox", (0.0, 0.0, DOCUMENT_SIZE, DOCUMENT_SIZE));

    // Optional <title> element
    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    // Optional <desc> element
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    // Optional <metadata> element with structured reduction config
    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("trackreduce:config");
        config_el.assign("xmlns:trackreduce", METADATA_NAMESPACE);
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    let Some(bound) = bound else {
        return finish(&doc);
    };
    let viewport = Viewport::fit(bound);

    for (layer, planar) in layers.iter().zip(&projected) {
        let fitted = viewport.apply_polyline(planar);

        let d = build_path_data(&fitted);
        if !d.is_empty() {
            let path = Path::new()
                .set("d", d)
                .set("fill", "none")
                .set("stroke", layer.stroke)
                .set("stroke-width", layer.stroke_width)
                .set("stroke-linejoin", "round");
            doc = doc.add(path);
        }

        if let Some(radius) = layer.marker_radius
            && !fitted.is_empty()
        {
            let mut markers = Group::new().set("fill", layer.stroke);
            for p in fitted.points() {
                markers = markers.add(
                    Circle::new()
                        .set("cx", p.x)
                        .set("cy", p.y)
                        .set("r", radius),
                );
            }
            doc = doc.add(markers);
        }
    }

    finish(&doc)
}

/// The svg crate omits the XML declaration, so we prepend it.
fn finish(doc: &Document) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Shorthand: no metadata (most tests don't care about it).
    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    /// A short trace near Zurich.
    fn trace() -> Polyline {
        Polyline::new(vec![
            Point::new(8.5417, 47.3769),
            Point::new(8.5430, 47.3775),
            Point::new(8.5442, 47.3771),
        ])
    }

    // --- build_path_data ---

    #[test]
    fn build_path_data_empty_polyline() {
        let polyline = Polyline::new(vec![]);
        assert_eq!(build_path_data(&polyline), "");
    }

    #[test]
    fn build_path_data_single_point() {
        let polyline = Polyline::new(vec![Point::new(5.0, 5.0)]);
        assert_eq!(build_path_data(&polyline), "");
    }

    #[test]
    fn build_path_data_three_points() {
        let polyline = Polyline::new(vec![
            Point::new(10.0, 15.0),
            Point::new(12.5, 18.3),
            Point::new(14.0, 20.1),
        ]);
        let d = build_path_data(&polyline);
        assert_eq!(d, "M10,15 L12.5,18.3 L14,20.1");
    }

    // --- Viewport ---

    #[test]
    fn viewport_fits_wide_bound_and_flips_y() {
        let viewport = Viewport::fit(Bound {
            min: Point::new(0.0, 0.0),
            max: Point::new(100.0, 50.0),
        });
        let low = viewport.apply(Point::new(0.0, 0.0));
        let high = viewport.apply(Point::new(100.0, 50.0));
        assert!((low.x - MARGIN).abs() < 1e-9);
        assert!((high.x - (DOCUMENT_SIZE - MARGIN)).abs() < 1e-9);
        // Centred vertically, south at the bottom.
        assert!((low.y - 740.0).abs() < 1e-9, "{low:?}");
        assert!((high.y - 260.0).abs() < 1e-9, "{high:?}");
    }

    #[test]
    fn viewport_centres_degenerate_bound() {
        let p = Point::new(5.0, 5.0);
        let viewport = Viewport::fit(Bound { min: p, max: p });
        let fitted = viewport.apply(p);
        assert!((fitted.x - DOCUMENT_SIZE / 2.0).abs() < 1e-9);
        assert!((fitted.y - DOCUMENT_SIZE / 2.0).abs() < 1e-9);
    }

    // --- Empty / degenerate inputs ---

    #[test]
    fn no_layers_produces_valid_svg_with_no_paths() {
        let svg = to_svg(&[], &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"viewBox="0 0 1000 1000""#));
        assert!(svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn empty_layer_is_skipped() {
        let empty = Polyline::default();
        let svg = to_svg(&[SvgLayer::line(&empty, "black", 1.0)], &no_meta());
        assert!(!svg.contains("<path"));
        assert!(!svg.contains("<circle"));
    }

    #[test]
    fn single_point_layer_draws_marker_only() {
        let single = Polyline::new(vec![Point::new(8.5417, 47.3769)]);
        let svg = to_svg(
            &[SvgLayer::line(&single, "red", 1.0).with_markers(3.0)],
            &no_meta(),
        );
        assert!(!svg.contains("<path"));
        assert_eq!(svg.matches("<circle").count(), 1);
        assert!(svg.contains(r#"cx="500""#));
    }

    // --- Layers ---

    #[test]
    fn layer_styles_are_applied() {
        let trace = trace();
        let svg = to_svg(&[SvgLayer::line(&trace, "#c33", 2.5)], &no_meta());
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains(r##"stroke="#c33""##));
        assert!(svg.contains(r#"stroke-width="2.5""#));
        assert!(svg.contains(r#"fill="none""#));
    }

    #[test]
    fn layers_are_drawn_in_order_with_markers() {
        let raw = trace();
        let reduced = Polyline::new(vec![raw.points()[0], raw.points()[2]]);
        let svg = to_svg(
            &[
                SvgLayer::line(&raw, "silver", 1.0),
                SvgLayer::line(&reduced, "crimson", 2.0).with_markers(4.0),
            ],
            &no_meta(),
        );
        assert_eq!(svg.matches("<path").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 2);
        let silver = svg.find("silver").unwrap();
        let crimson = svg.find("crimson").unwrap();
        assert!(silver < crimson);
    }

    #[test]
    fn fitted_coordinates_stay_inside_viewbox() {
        let trace = trace();
        let svg = to_svg(&[SvgLayer::line(&trace, "black", 1.0)], &no_meta());
        let d_start = svg.find(r#"d=""#).unwrap() + 3;
        let d_end = d_start + svg[d_start..].find('"').unwrap();
        for pair in svg[d_start..d_end].split_whitespace() {
            let coords = pair.trim_start_matches(['M', 'L']);
            let (x, y) = coords.split_once(',').unwrap();
            let (x, y): (f64, f64) = (x.parse().unwrap(), y.parse().unwrap());
            assert!((MARGIN - 1e-3..=DOCUMENT_SIZE - MARGIN + 1e-3).contains(&x));
            assert!((MARGIN - 1e-3..=DOCUMENT_SIZE - MARGIN + 1e-3).contains(&y));
        }
    }

    // --- Metadata ---

    #[test]
    fn title_and_desc_emitted_when_present() {
        let meta = SvgMetadata {
            title: Some("morning-run"),
            description: Some("smoothing=10 noise=200 threshold=1"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&[], &meta);
        assert!(svg.contains("<title>morning-run</title>"));
        assert!(svg.contains("<desc>smoothing=10 noise=200 threshold=1</desc>"));
    }

    #[test]
    fn title_and_desc_omitted_when_none() {
        let svg = to_svg(&[], &no_meta());
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<desc>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn special_characters_in_title_are_escaped() {
        let meta = SvgMetadata {
            title: Some("A <B> & C"),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&[], &meta);
        assert!(svg.contains("<title>A &lt;B&gt; &amp; C</title>"));
    }

    #[test]
    fn metadata_element_emitted_when_config_json_present() {
        let meta = SvgMetadata {
            config_json: Some(r#"{"smoothing":10}"#),
            ..SvgMetadata::default()
        };
        let svg = to_svg(&[], &meta);
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains(&format!(
            r#"<trackreduce:config xmlns:trackreduce="{METADATA_NAMESPACE}">"#
        )));
        assert!(svg.contains("</trackreduce:config>"));
    }

    #[test]
    fn metadata_appears_after_desc_and_before_paths() {
        let trace = trace();
        let meta = SvgMetadata {
            title: Some("test"),
            description: Some("desc"),
            config_json: Some(r#"{"threshold":1.0}"#),
        };
        let svg = to_svg(&[SvgLayer::line(&trace, "black", 1.0)], &meta);

        let title_pos = svg.find("<title>").unwrap();
        let desc_pos = svg.find("<desc>").unwrap();
        let metadata_pos = svg.find("<metadata>").unwrap();
        let path_pos = svg.find("<path").unwrap();
        assert!(title_pos < desc_pos, "title should come before desc");
        assert!(desc_pos < metadata_pos, "desc should come before metadata");
        assert!(metadata_pos < path_pos, "metadata should come before paths");
    }
}
