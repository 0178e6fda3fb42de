/// One selectable port as reported by a backend's enumeration.
#[derive(Clone, Debug)]
pub struct PortInfo {
    pub name: String,
    pub driver: String,
}
