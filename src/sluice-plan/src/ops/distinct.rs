#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Distinct {}

impl Distinct {
    pub fn multiline_display(&self) -> Vec<String> {
        vec!["Distinct".to_string()]
    }
}
