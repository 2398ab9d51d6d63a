use csv::WriterBuilder;
use eyre::{Result, WrapErr};
use ndarray::Array1;
use serde_derive::Serialize;
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::algorithms::{Move, Status};
use crate::structs::vertex::{Vertex, VertexSet};

/// Final outcome of a run
///
/// Built once from the best vertex of the ordered simplex when the engine stops.
#[derive(Debug, Clone, Serialize)]
pub struct SimplexResult {
    names: Vec<String>,
    values: Vec<f64>,
    cost: f64,
    iterations: usize,
    evaluations: usize,
    status: Status,
    log: IterationLog,
}

impl SimplexResult {
    pub(crate) fn new(
        names: Vec<String>,
        best: &Vertex,
        iterations: usize,
        evaluations: usize,
        status: Status,
        log: IterationLog,
    ) -> Self {
        Self {
            names,
            values: best.point().to_vec(),
            cost: best.cost().unwrap_or(f64::NAN),
            iterations,
            evaluations,
            status,
            log,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn point(&self) -> Array1<f64> {
        Array1::from(self.values.clone())
    }

    /// Optimized value of the parameter called `name`
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn log(&self) -> &IterationLog {
        &self.log
    }

    /// Write `result.csv` and `iterations.csv` to `folder`
    pub fn write(&self, folder: &str) -> Result<()> {
        tracing::debug!("Writing result...");
        let outputfile = OutputFile::new(folder, "result.csv")?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(outputfile.file());
        writer.write_record(["parameter", "value"])?;
        for (name, value) in self.names.iter().zip(self.values.iter()) {
            writer.write_record([name.clone(), value.to_string()])?;
        }
        writer.write_record(["cost".to_string(), self.cost.to_string()])?;
        writer.write_record(["iterations".to_string(), self.iterations.to_string()])?;
        writer.write_record(["evaluations".to_string(), self.evaluations.to_string()])?;
        writer.write_record(["status".to_string(), self.status.to_string()])?;
        writer.flush()?;

        self.log.write(folder, &self.names)?;
        tracing::info!(
            "Result written to {:?}",
            outputfile.relative_path().parent().unwrap_or(Path::new(folder))
        );
        Ok(())
    }
}

/// Summary of one iteration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub step: Move,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub size: f64,
    pub best: Vec<f64>,
}

/// Holds an [IterationRecord] for every iteration of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IterationLog {
    records: Vec<IterationRecord>,
}

impl IterationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: IterationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of iterations that ended with the given move
    pub fn count(&self, step: Move) -> usize {
        self.records.iter().filter(|r| r.step == step).count()
    }

    pub fn write(&self, folder: &str, names: &[String]) -> Result<()> {
        tracing::debug!("Writing iterations...");
        let outputfile = OutputFile::new(folder, "iterations.csv")?;
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .from_writer(outputfile.file());

        writer.write_field("iteration")?;
        writer.write_field("move")?;
        writer.write_field("best_cost")?;
        writer.write_field("worst_cost")?;
        writer.write_field("size")?;
        for name in names {
            writer.write_field(name)?;
        }
        writer.write_record(None::<&[u8]>)?;

        for record in &self.records {
            writer.write_field(record.iteration.to_string())?;
            writer.write_field(record.step.to_string())?;
            writer.write_field(record.best_cost.to_string())?;
            writer.write_field(record.worst_cost.to_string())?;
            writer.write_field(record.size.to_string())?;
            for value in &record.best {
                writer.write_field(value.to_string())?;
            }
            writer.write_record(None::<&[u8]>)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Writes the per-iteration progress files
///
/// `nmSimplex_<name>_Vertices` receives the ordered vertex table of every iteration and
/// `nmSimplex_<name>_fValue` one line with the best vertex.
#[derive(Debug)]
pub struct ProgressWriter {
    vertices: OutputFile,
    values: OutputFile,
    names: Vec<String>,
}

impl ProgressWriter {
    /// Open both files in `folder`, appending when `append` is set
    pub fn new(folder: &str, function_name: &str, names: Vec<String>, append: bool) -> Result<Self> {
        let open = |folder: &str, name: &str| OutputFile::open(folder, name, append);
        Ok(Self {
            vertices: open(folder, &format!("nmSimplex_{}_Vertices", function_name))?,
            values: open(folder, &format!("nmSimplex_{}_fValue", function_name))?,
            names,
        })
    }

    pub fn record_vertices(&mut self, iteration: usize, vertices: &VertexSet) -> Result<()> {
        let file = &mut self.vertices.file;
        writeln!(file, "  Iteration: {}", iteration)?;
        write!(file, "{}", vertices.table(&self.names))?;
        writeln!(file)?;
        Ok(())
    }

    pub fn record_best(&mut self, iteration: usize, best: &Vertex) -> Result<()> {
        writeln!(
            self.values.file,
            "Iteration {:>5}   {}",
            iteration,
            best.line("A[0]")
        )?;
        Ok(())
    }

    pub fn paths(&self) -> (&Path, &Path) {
        (self.vertices.relative_path(), self.values.relative_path())
    }
}

#[derive(Debug)]
pub struct OutputFile {
    file: File,
    relative_path: PathBuf,
}

impl OutputFile {
    /// Create or truncate `folder/file_name`, creating missing directories
    pub fn new(folder: &str, file_name: &str) -> Result<Self> {
        Self::open(folder, file_name, false)
    }

    /// Like [OutputFile::new], but keeps the existing content
    pub fn append(folder: &str, file_name: &str) -> Result<Self> {
        Self::open(folder, file_name, true)
    }

    fn open(folder: &str, file_name: &str, append: bool) -> Result<Self> {
        let relative_path = Path::new(&folder).join(file_name);

        if let Some(parent) = relative_path.parent() {
            create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directories for {:?}", parent))?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options
            .open(&relative_path)
            .wrap_err_with(|| format!("Failed to open file: {:?}", relative_path))?;

        Ok(OutputFile {
            file,
            relative_path,
        })
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn file_owned(self) -> File {
        self.file
    }

    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }
}
