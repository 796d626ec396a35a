use super::error::WordStreamError;

/// WordStream is a cheap, copyable cursor over a slice of 32-bit words.
///
/// Every access is range checked; reading past the end gives a
/// `WordStreamError::InsufficientData` instead of a panic.
#[derive(Debug, Clone, Copy)]
pub struct WordStream<'a> {
    words: &'a [u32],
    pos: usize,
}

impl<'a> WordStream<'a> {
    pub fn new(words: &'a [u32]) -> Self {
        Self { words, pos: 0 }
    }

    /// Look at the word `offset` positions ahead without moving
    pub fn peek(&self, offset: usize) -> Result<u32, WordStreamError> {
        self.words
            .get(self.pos + offset)
            .copied()
            .ok_or(WordStreamError::InsufficientData {
                requested: offset + 1,
                available: self.remaining(),
            })
    }

    /// Read the current word and move past it
    pub fn read(&mut self) -> Result<u32, WordStreamError> {
        let word = self.peek(0)?;
        self.pos += 1;
        Ok(word)
    }

    /// Move `n` words ahead. Fails without moving if fewer than `n` remain.
    pub fn advance(&mut self, n: usize) -> Result<(), WordStreamError> {
        if n > self.remaining() {
            return Err(WordStreamError::InsufficientData {
                requested: n,
                available: self.remaining(),
            });
        }
        self.pos += n;
        Ok(())
    }

    /// Borrow the next `n` words and move past them
    pub fn take(&mut self, n: usize) -> Result<&'a [u32], WordStreamError> {
        let available = self.remaining();
        let slice = self
            .words
            .get(self.pos..self.pos + n)
            .ok_or(WordStreamError::InsufficientData {
                requested: n,
                available,
            })?;
        self.pos += n;
        Ok(slice)
    }

    pub fn remaining(&self) -> usize {
        self.words.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Everything from the cursor to the end of the buffer
    pub fn rest(&self) -> &'a [u32] {
        &self.words[self.pos.min(self.words.len())..]
    }
}
