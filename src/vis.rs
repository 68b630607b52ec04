use crate::lattice::Lattice;
use plotly::layout::{Axis, Layout};
use plotly::{HeatMap, Plot};

fn save_or_show(plot: Plot, show: bool, save_as: Option<String>) {
    if let Some(path) = save_as {
        plot.write_html(path);
    }

    if show {
        plot.show();
    }
}

/// Render a configuration snapshot as a colour-mapped grid with `title`.
/// The lattice is only read; the caller keeps ownership.
pub fn plot_configuration(lattice: &Lattice, title: &str, show: bool, save_as: Option<String>) {
    let heat_map = HeatMap::new_z(lattice.to_rows());

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("y [site]"))
        .y_axis(Axis::new().title("x [site]"));

    let mut plot = Plot::new();
    plot.add_trace(heat_map);
    plot.set_layout(layout);

    save_or_show(plot, show, save_as);
}
