use facematrix_vision::Matrices;
use ndarray::Array2;
use serde::Serialize;

/// Which matrices to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Only {
    #[default]
    Both,
    Distance,
    Similarity,
}

/// Rows of whitespace-separated values, one line per row.
pub fn format_matrix(matrix: &Array2<f32>) -> String {
    let mut out = String::new();
    for row in matrix.rows() {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        out.push_str(&line.join(" "));
        out.push('\n');
    }
    out
}

fn rows(matrix: &Array2<f32>) -> Vec<Vec<f32>> {
    matrix.rows().into_iter().map(|r| r.to_vec()).collect()
}

/// JSON shape of one comparison run.
#[derive(Debug, Serialize)]
pub struct Report {
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<Vec<Vec<f32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<Vec<Vec<f32>>>,
}

impl Report {
    pub fn new(images: Vec<String>, matrices: &Matrices, only: Only) -> Self {
        let distance = matches!(only, Only::Both | Only::Distance).then(|| rows(&matrices.distance));
        let similarity =
            matches!(only, Only::Both | Only::Similarity).then(|| rows(&matrices.similarity));
        Self {
            images,
            distance,
            similarity,
        }
    }
}

/// Text blocks in the order distance, similarity.
pub fn render_text(matrices: &Matrices, only: Only) -> String {
    let mut out = String::new();
    if matches!(only, Only::Both | Only::Distance) {
        out.push_str("DistanceMatrix:\n");
        out.push_str(&format_matrix(&matrices.distance));
    }
    if matches!(only, Only::Both | Only::Similarity) {
        out.push_str("SimilarityMatrix:\n");
        out.push_str(&format_matrix(&matrices.similarity));
    }
    out
}
