use std::fmt::Display;

#[derive(Debug)]
pub enum BemError {
    Input(String),
    Config(String),
    Surface(String),
    Decimation(String),
    Topology(String),
    Output(String),
}

impl Display for BemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (err_name, value) = match self {
            BemError::Input(v) => ("Input", v),
            BemError::Config(v) => ("Config", v),
            BemError::Surface(v) => ("Surface", v),
            BemError::Decimation(v) => ("Decimation", v),
            BemError::Topology(v) => ("Topology", v),
            BemError::Output(v) => ("Output", v),
        };

        write!(f, "{} error: {}", err_name, value)
    }
}

impl std::error::Error for BemError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_kind() {
        let err = BemError::Topology("Surface inner skull is not complete".to_owned());
        assert_eq!(
            err.to_string(),
            "Topology error: Surface inner skull is not complete"
        );
        assert_eq!(
            BemError::Output("disk full".to_owned()).to_string(),
            "Output error: disk full"
        );
    }
}
