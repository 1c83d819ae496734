#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Cross {}

impl Cross {
    pub fn multiline_display(&self) -> Vec<String> {
        vec!["Cross".to_string()]
    }
}
