/// sampling heuristic of the renderer, selected with a short flag on its command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Heuristic {
    Color,
    DepthDist,
    DepthAngle,
}

impl Heuristic {
    pub const ALL: [Heuristic; 3] = [Heuristic::Color, Heuristic::DepthDist, Heuristic::DepthAngle];

    pub fn flag(&self) -> &'static str {
        match self {
            Heuristic::Color => "c",
            Heuristic::DepthDist => "d",
            Heuristic::DepthAngle => "da",
        }
    }

    /// column name in the timing tables
    pub fn label(&self) -> &'static str {
        match self {
            Heuristic::Color => "color heuristic",
            Heuristic::DepthDist => "depth euler heuristic",
            Heuristic::DepthAngle => "depth angle heuristic",
        }
    }

    /// folder the renderer writes its novel-view screenshots to
    pub fn novel_folder(&self) -> &'static str {
        match self {
            Heuristic::Color => "novel_c",
            Heuristic::DepthDist => "novel_d",
            Heuristic::DepthAngle => "novel_da",
        }
    }

    pub fn report_key(&self) -> &'static str {
        match self {
            Heuristic::Color => "color",
            Heuristic::DepthDist => "dist",
            Heuristic::DepthAngle => "dist_angle",
        }
    }
}

impl std::fmt::Display for Heuristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.flag())
    }
}

impl std::str::FromStr for Heuristic {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c" => Ok(Heuristic::Color),
            "d" => Ok(Heuristic::DepthDist),
            "da" => Ok(Heuristic::DepthAngle),
            _ => Err(anyhow::anyhow!("unknown heuristic flag: {s}")),
        }
    }
}

#[test]
fn test_flag_roundtrip() {
    for h in Heuristic::ALL {
        let h1: Heuristic = h.flag().parse().unwrap();
        assert_eq!(h, h1);
    }
    assert!("x".parse::<Heuristic>().is_err());
    assert_eq!(Heuristic::DepthAngle.novel_folder(), "novel_da");
}
