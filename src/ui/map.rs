use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    widgets::{
        canvas::{Canvas, Line as CanvasLine, Points},
        Block, Borders, Paragraph, Widget,
    },
};

use walkr::path::PolylinePath;

/// Draw the walked route scaled to its own bounding box
pub fn render_map(path: &PolylinePath, area: Rect, buf: &mut Buffer) {
    let block = Block::default().borders(Borders::ALL).title("Route");

    let Some((x_bounds, y_bounds)) = path.bounds() else {
        Paragraph::new("waiting for a GPS fix")
            .style(Style::default().add_modifier(Modifier::DIM | Modifier::ITALIC))
            .alignment(Alignment::Center)
            .block(block)
            .render(area, buf);
        return;
    };

    Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds(x_bounds)
        .y_bounds(y_bounds)
        .paint(|ctx| {
            for ((x1, y1), (x2, y2)) in path.segments() {
                ctx.draw(&CanvasLine {
                    x1,
                    y1,
                    x2,
                    y2,
                    color: Color::Magenta,
                });
            }
            if let Some(&current) = path.points().last() {
                ctx.draw(&Points {
                    coords: &[current],
                    color: Color::Yellow,
                });
            }
        })
        .render(area, buf);
}

/// Label for the most recent position
pub fn format_position(path: &PolylinePath) -> Option<String> {
    path.points()
        .last()
        .map(|(lon, lat)| format!("{lat:.5}, {lon:.5}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;
    use walkr::geo::GeoFix;
    use walkr::path::PathRenderer;

    #[test]
    fn test_format_position() {
        let mut path = PolylinePath::new();
        assert_eq!(format_position(&path), None);
        path.append(&GeoFix::new(37.5665, 126.978, Local::now()));
        assert_eq!(format_position(&path).as_deref(), Some("37.56650, 126.97800"));
    }
}
