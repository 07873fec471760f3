use regex::Regex;

/// A contiguous interval of the source video between two detected cuts.
/// `index` matches detection (chronological) order and is the only key that
/// ties a segment file back to its slot in the final assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scene {
    pub index: usize,
    pub start: f64,
    pub end: f64,
}

impl Scene {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Pull the `pts_time:` values out of ffmpeg's showinfo stderr output.
pub fn parse_showinfo_times(stderr: &str) -> Vec<f64> {
    let re = Regex::new(r"pts_time:([0-9]+(?:\.[0-9]+)?)").unwrap();
    stderr
        .lines()
        .filter(|line| line.contains("showinfo"))
        .filter_map(|line| re.captures(line))
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Pair consecutive cut points into scenes. Non-increasing pairs (duplicate
/// timestamps from the detector) are dropped so every scene has `end > start`.
pub fn pair_cut_points(times: &[f64]) -> Vec<Scene> {
    times
        .windows(2)
        .filter(|pair| pair[1] > pair[0])
        .enumerate()
        .map(|(index, pair)| Scene {
            index,
            start: pair[0],
            end: pair[1],
        })
        .collect()
}
