use anyhow::Context;

/// numeric table with one index column and named value columns
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    pub index_name: String,
    pub index: Vec<f64>,
    pub columns: Vec<(String, Vec<f64>)>,
}

/// rounds to `decimals` places, exact halves go to the even neighbour
pub fn round_to<T: num_traits::Float>(v: T, decimals: i32) -> T {
    let scale = T::from(10f64.powi(decimals)).unwrap_or_else(T::one);
    let x = v * scale;
    let two = T::one() + T::one();
    let mut r = x.round();
    if (r - x).abs() == T::one() / two {
        r = (x / two).round() * two;
    }
    r / scale
}

impl Table {
    pub fn new(index_name: &str, index: Vec<f64>) -> Self {
        Table {
            index_name: index_name.to_string(),
            index,
            columns: vec![],
        }
    }

    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    pub fn push_column(&mut self, name: &str, values: Vec<f64>) -> anyhow::Result<()> {
        anyhow::ensure!(
            values.len() == self.index.len(),
            "column `{}` has {} values but the index `{}` has {}",
            name,
            values.len(),
            self.index_name,
            self.index.len()
        );
        self.columns.push((name.to_string(), values));
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    /// largest value over all columns, `None` for an empty table
    pub fn max_value(&self) -> Option<f64> {
        self.columns
            .iter()
            .flat_map(|(_, v)| v.iter().copied())
            .reduce(f64::max)
    }

    pub fn rounded(&self, decimals: i32) -> Table {
        Table {
            index_name: self.index_name.clone(),
            index: self.index.iter().map(|&v| round_to(v, decimals)).collect(),
            columns: self
                .columns
                .iter()
                .map(|(n, v)| (n.clone(), v.iter().map(|&v| round_to(v, decimals)).collect()))
                .collect(),
        }
    }

    /// `(index, value)` points of every column
    pub fn series(&self) -> impl Iterator<Item = (&str, Vec<(f64, f64)>)> + '_ {
        self.columns.iter().map(|(name, values)| {
            let points = itertools::zip_eq(self.index.iter().copied(), values.iter().copied())
                .collect::<Vec<_>>();
            (name.as_str(), points)
        })
    }

    pub fn write_csv<PATH: AsRef<std::path::Path>>(&self, path: PATH) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        let mut header = vec![self.index_name.as_str()];
        header.extend(self.columns.iter().map(|(n, _)| n.as_str()));
        writer.write_record(&header)?;
        for i_row in 0..self.num_rows() {
            let mut record = vec![self.index[i_row].to_string()];
            record.extend(self.columns.iter().map(|(_, v)| v[i_row].to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// whitespace separated rows with a header line
impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index_name)?;
        for (name, _) in &self.columns {
            write!(f, "\t{}", name)?;
        }
        writeln!(f)?;
        for i_row in 0..self.num_rows() {
            write!(f, "{}", self.index[i_row])?;
            for (_, values) in &self.columns {
                write!(f, "\t{}", values[i_row])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[test]
fn test_round() {
    assert_eq!(round_to(12.34f64, 1), 12.3);
    assert_eq!(round_to(12.36f64, 1), 12.4);
    assert_eq!(round_to(-0.25f64, 1), -0.2);
    assert_eq!(round_to(2.25f64, 1), 2.2);
    assert_eq!(round_to(12.25f64, 1), 12.2);
    assert_eq!(round_to(10.75f64, 1), 10.8);
    assert_eq!(round_to(2.5f64, 0), 2.0);
    assert_eq!(round_to(3.5f64, 0), 4.0);
    assert_eq!(round_to(7.0f32, 1), 7.0);
}

#[test]
fn test_table() -> anyhow::Result<()> {
    let mut table = Table::new("samples", vec![1., 2., 3.]);
    table.push_column("color heuristic", vec![10.04, 11.06, 12.0])?;
    table.push_column("depth euler heuristic", vec![20.0, 40.26, 30.0])?;
    assert!(table.push_column("bad", vec![1.0]).is_err());
    let table = table.rounded(1);
    assert_eq!(table.column("color heuristic"), Some(&[10.0, 11.1, 12.0][..]));
    assert_eq!(table.max_value(), Some(40.3));
    assert!(table.column("depth angle heuristic").is_none());
    let series: Vec<_> = table.series().collect();
    assert_eq!(series.len(), 2);
    assert_eq!(series[1].1[1], (2.0, 40.3));
    Ok(())
}

#[test]
fn test_write_csv() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("samples.csv");
    let mut table = Table::new("views", vec![4., 6.]);
    table.push_column("color heuristic", vec![1.5, 2.0])?;
    table.write_csv(&path)?;
    let text = std::fs::read_to_string(&path)?;
    assert_eq!(text, "views,color heuristic\n4,1.5\n6,2\n");
    assert_eq!(table.to_string(), "views\tcolor heuristic\n4\t1.5\n6\t2\n");
    Ok(())
}
