/// Whether the download dialog is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Visibility {
    open: bool,
}

impl Visibility {
    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

#[cfg(test)]
mod tests {
    use super::Visibility;

    #[test]
    fn starts_closed() {
        assert!(!Visibility::default().is_open());
    }

    #[test]
    fn open_and_close_are_idempotent() {
        let mut visibility = Visibility::default();
        visibility.open();
        visibility.open();
        assert!(visibility.is_open());
        visibility.close();
        visibility.close();
        assert!(!visibility.is_open());
    }
}
