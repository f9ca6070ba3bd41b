#[cfg(test)]
#[path = "composer_test.rs"]
mod tests;

/// Transient input that has not been sent yet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Composer {
    pub text: String,
    pub images: Vec<String>,
}

impl Composer {
    pub fn new(text: &str) -> Composer {
        return Composer {
            text: text.to_string(),
            images: vec![],
        };
    }

    pub fn attach(&mut self, image: String) {
        self.images.push(image);
    }

    /// Drops one pending attachment by zero based index.
    pub fn detach(&mut self, index: usize) -> Option<String> {
        if index >= self.images.len() {
            return None;
        }

        return Some(self.images.remove(index));
    }

    /// Drops every pending attachment and returns how many there were.
    pub fn detach_all(&mut self) -> usize {
        let count = self.images.len();
        self.images.clear();
        return count;
    }

    /// Puts back input that could not be sent. Text typed since then wins,
    /// the returned attachments go ahead of newer ones.
    pub fn restore(&mut self, returned: Composer) {
        if self.text.trim().is_empty() {
            self.text = returned.text;
        }

        let newer = std::mem::replace(&mut self.images, returned.images);
        self.images.extend(newer);
    }

    pub fn is_sendable(&self) -> bool {
        return !self.text.trim().is_empty() || !self.images.is_empty();
    }

    /// Returns the trimmed text and attachments, leaving the composer empty.
    pub fn take(&mut self) -> (String, Vec<String>) {
        let text = self.text.trim().to_string();
        self.text.clear();

        return (text, std::mem::take(&mut self.images));
    }
}
