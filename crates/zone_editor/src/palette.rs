//! Colours handed out to newly drawn zones, in order.

pub const ZONE_COLORS: [&str; 8] = [
    "#ffc864", // orange
    "#6496ff", // blue
    "#64ff96", // green
    "#ff64c8", // pink
    "#c864ff", // purple
    "#ffff64", // yellow
    "#64ffff", // cyan
    "#ff9664", // coral
];

pub fn color_for(index: usize) -> &'static str {
    ZONE_COLORS[index % ZONE_COLORS.len()]
}
