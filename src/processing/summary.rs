use crate::discretization::mesh::{Mesh, distance};
use crate::model::Model;
use crate::survey::Survey;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

pub struct RunSummary {
    // Mesh info
    pub num_cells: usize,
    pub num_faces: usize,
    pub num_boundary_faces: usize,
    pub domain_extent: (f64, f64),
    pub min_cell_spacing: f64,
    pub max_cell_spacing: f64,
    pub avg_cell_volume: f64,

    // Model info
    pub model: String,
    pub model_range: (f64, f64),

    // Data info
    pub num_data: usize,
    pub noise_std: Option<f64>,
    pub dtrue_range: Option<(f64, f64)>,
    pub rms_noise: Option<f64>,
    pub normalized_misfit: Option<f64>,
}

impl RunSummary {
    pub fn from_run(mesh: &Mesh, model: &Model, m: &nalgebra::DVector<f64>, survey: &Survey) -> Self {
        let num_cells = mesh.cells.len();

        let x_coords: Vec<f64> = mesh.cells.iter().map(|c| c.centroid[0]).collect();
        let x_min = x_coords.iter().cloned().fold(f64::INFINITY, f64::min);
        let x_max = x_coords.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        let spacings: Vec<f64> = mesh
            .faces
            .iter()
            .filter_map(|face| match face.neighbor_cell_ids {
                (k, Some(l)) => Some(distance(mesh.cells[k].centroid, mesh.cells[l].centroid)),
                _ => None,
            })
            .collect();
        let min_spacing = spacings.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_spacing = spacings.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let avg_volume = mesh.cells.iter().map(|c| c.volume).sum::<f64>() / num_cells.max(1) as f64;

        let dtrue_range = survey.dtrue.as_ref().map(|d| (d.min(), d.max()));
        let rms_noise = match (&survey.dobs, &survey.dtrue) {
            (Some(dobs), Some(dtrue)) if !dobs.is_empty() => {
                Some(((dobs - dtrue).norm_squared() / dobs.len() as f64).sqrt())
            }
            _ => None,
        };
        // chi^2 / N of dtrue against dobs with the survey's own weights
        let normalized_misfit = match (&survey.dtrue, survey.weights()) {
            (Some(dtrue), Ok(w)) => survey
                .residual(dtrue)
                .ok()
                .map(|r| r.component_mul(&w).norm_squared() / r.len() as f64),
            _ => None,
        };

        Self {
            num_cells,
            num_faces: mesh.faces.len(),
            num_boundary_faces: mesh.boundary_faces().count(),
            domain_extent: (x_min, x_max),
            min_cell_spacing: min_spacing,
            max_cell_spacing: max_spacing,
            avg_cell_volume: avg_volume,
            model: model.to_string(),
            model_range: (m.min(), m.max()),
            num_data: survey.nd(),
            noise_std: survey.std.as_ref().and_then(|s| s.iter().next().copied()),
            dtrue_range,
            rms_noise,
            normalized_misfit,
        }
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = File::create(path)?;

        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file, "SYNTHETIC SURVEY SUMMARY")?;
        writeln!(file, "{}", "=".repeat(60))?;
        writeln!(file)?;

        writeln!(file, "MESH STATISTICS")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Number of cells:     {}", self.num_cells)?;
        writeln!(file, "Number of faces:     {}", self.num_faces)?;
        writeln!(file, "Boundary faces:      {}", self.num_boundary_faces)?;
        writeln!(
            file,
            "Domain extent (x):   {:.6e} to {:.6e}",
            self.domain_extent.0, self.domain_extent.1
        )?;
        writeln!(file, "Min cell spacing:    {:.6e}", self.min_cell_spacing)?;
        writeln!(file, "Max cell spacing:    {:.6e}", self.max_cell_spacing)?;
        writeln!(file, "Avg cell volume:     {:.6e}", self.avg_cell_volume)?;
        writeln!(file)?;

        writeln!(file, "MODEL")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Mapping:             {}", self.model)?;
        writeln!(
            file,
            "Parameter range:     {:.6e} to {:.6e}",
            self.model_range.0, self.model_range.1
        )?;
        writeln!(file)?;

        writeln!(file, "DATA")?;
        writeln!(file, "{}", "-".repeat(60))?;
        writeln!(file, "Number of data:      {}", self.num_data)?;
        if let Some(std) = self.noise_std {
            writeln!(file, "Relative noise std:  {:.4}", std)?;
        }
        if let Some((lo, hi)) = self.dtrue_range {
            writeln!(file, "dtrue range:         {:.6e} to {:.6e}", lo, hi)?;
        }
        if let Some(rms) = self.rms_noise {
            writeln!(file, "RMS noise:           {:.6e}", rms)?;
        }
        if let Some(phi) = self.normalized_misfit {
            writeln!(file, "Misfit of dtrue/N:   {:.6e}", phi)?;
        }
        writeln!(file)?;

        writeln!(file, "{}", "=".repeat(60))?;

        Ok(())
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("SYNTHETIC SURVEY SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Mesh:          {} cells, {} faces",
            self.num_cells, self.num_faces
        );
        println!("Model:         {}", self.model);
        println!("Data:          {}", self.num_data);
        if let Some(rms) = self.rms_noise {
            println!("RMS noise:     {:.3e}", rms);
        }
        if let Some(phi) = self.normalized_misfit {
            println!("Misfit/N:      {:.3e}", phi);
        }
        println!("{}\n", "=".repeat(60));
    }
}
