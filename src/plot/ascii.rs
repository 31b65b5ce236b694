//! ASCII plotting for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - mean across series: `-` line
//! - mean ± SEM envelope: `:` lines
//! - stimulus time: `|` column

use crate::report::Figure;

/// Render a figure (mean ± SEM over `time`) as text.
///
/// Undefined points (`NaN` mean or SEM) break the corresponding line.
pub fn render_band_plot(
    figure: &Figure,
    time: &[f64],
    stimulus_time: Option<f64>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let band = &figure.band;
    let n = time.len().min(band.len());
    let (t_min, t_max) = value_range(time[..n].iter().copied()).unwrap_or((0.0, 1.0));

    let upper: Vec<f64> = (0..n).map(|i| band.mean[i] + band.sem[i]).collect();
    let lower: Vec<f64> = (0..n).map(|i| band.mean[i] - band.sem[i]).collect();
    let (y_min, y_max) = value_range(
        band.mean[..n]
            .iter()
            .chain(upper.iter())
            .chain(lower.iter())
            .copied(),
    )
    .unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];
    let project = |values: &[f64]| -> Vec<Option<(usize, usize)>> {
        (0..n)
            .map(|i| {
                let y = values[i];
                if y.is_finite() && time[i].is_finite() {
                    Some((
                        map_x(time[i], t_min, t_max, width),
                        map_y(y, y_min, y_max, height),
                    ))
                } else {
                    None
                }
            })
            .collect()
    };

    // Mean first so it wins over the envelope.
    draw_polyline(&mut grid, &project(&band.mean[..n]), '-');
    draw_polyline(&mut grid, &project(&upper), ':');
    draw_polyline(&mut grid, &project(&lower), ':');

    if let Some(ts) = stimulus_time.filter(|t| t.is_finite() && *t >= t_min && *t <= t_max) {
        let x = map_x(ts, t_min, t_max, width);
        for row in grid.iter_mut() {
            if row[x] == ' ' {
                row[x] = '|';
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{} | t=[{t_min:.2}, {t_max:.2}] s | {}=[{y_min:.2}, {y_max:.2}]\n",
        figure.title, figure.y_label
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn value_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut min_v = f64::INFINITY;
    let mut max_v = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        min_v = min_v.min(v);
        max_v = max_v.max(v);
    }
    if min_v.is_finite() && max_v.is_finite() && max_v > min_v {
        Some((min_v, max_v))
    } else if min_v.is_finite() {
        // Flat signal: centre it in a unit-wide range.
        Some((min_v - 0.5, max_v + 0.5))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(t: f64, t_min: f64, t_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((t - t_min) / (t_max - t_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Connect consecutive defined points; `None` breaks the line.
fn draw_polyline(grid: &mut [Vec<char>], points: &[Option<(usize, usize)>], ch: char) {
    let mut prev: Option<(usize, usize)> = None;
    for p in points {
        match (*p, prev) {
            (Some((x, y)), Some((x0, y0))) => draw_line(grid, x0, y0, x, y, ch),
            (Some((x, y)), None) => {
                if grid[y][x] == ' ' {
                    grid[y][x] = ch;
                }
            }
            (None, _) => {}
        }
        prev = *p;
    }
}

/// Integer line drawing (Bresenham-ish). Only blank cells are written.
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::SummaryBand;

    fn figure(mean: Vec<f64>, sem: Vec<f64>) -> Figure {
        let n = mean.len();
        Figure {
            title: "Z".to_string(),
            y_label: "z".to_string(),
            band: SummaryBand {
                mean,
                sem,
                n_valid: vec![3; n],
            },
        }
    }

    #[test]
    fn plot_golden_snapshot_small() {
        let fig = figure(vec![5.0, 5.0], vec![1.0, 1.0]);
        let txt = render_band_plot(&fig, &[0.0, 9.0], Some(4.5), 10, 5);
        let expected = concat!(
            "Z | t=[0.00, 9.00] s | z=[3.90, 6.10]\n",
            "::::::::::\n",
            "     |    \n",
            "----------\n",
            "     |    \n",
            "::::::::::\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn undefined_points_do_not_panic() {
        let fig = figure(vec![f64::NAN, 1.0, 2.0, f64::NAN], vec![f64::NAN, f64::NAN, 0.5, 0.5]);
        let txt = render_band_plot(&fig, &[0.0, 1.0, 2.0, 3.0], None, 20, 6);
        assert_eq!(txt.lines().count(), 7);

        let empty = figure(vec![f64::NAN; 3], vec![f64::NAN; 3]);
        let txt = render_band_plot(&empty, &[0.0, 1.0, 2.0], Some(1.0), 10, 5);
        assert!(txt.lines().skip(1).all(|l| l.chars().all(|c| c == ' ' || c == '|')));
    }
}
