use super::{FeatureExtractor, FeatureSet};
use crate::derivation::{DerivationNode, Terminal};
use crate::parser::ParserState;
use crate::sentence::Sentence;
use strum::{Display, EnumIter};

/// Filler for stack items below the bottom of the stack.
pub const BOUNDARY: &str = "#BOS#";

/// Widest context window the templates cover.
pub const MAX_WINDOW: usize = 3;

/// Feature templates. `L<k>` is the `k`-th word left of the read position,
/// `N<k>` the `k`-th word from it; `S<k>` is the `k`-th stack item from the
/// top. `W`, `P`, `C`, `A` and `H` select the word, POS, category, extra
/// field and head word.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FeatureTemplate {
    L1W_S1C,
    L2W_S1C,
    L3W_S1C,
    N1W_S1C,
    N2W_S1C,
    L1W_N1W_S1C,
    N1W_N2W_S1C,
    L3W_L2W_S1C,
    L2W_L1W_S1C,

    L1P_S1C,
    L2P_S1C,
    L3P_S1C,
    N1P_S1C,
    N2P_S1C,
    L2P_L1P_S1C,
    L3P_L2P_S1C,
    L1P_N1P_S1C,
    N1P_N2P_S1C,

    S1W_S1C,
    S1LeW_S1C,
    S1RiW_S1C,
    S1P_S1C,
    S1LeP_S1C,
    S1RiP_S1C,
    S1LeP_S1RiP_S1C,

    S1W_S2W,
    S1C_S2C,
    S1C_S2C_S3C,
    S1C_S2H,
    S1H_S2C,
    S1C_S2P,
    S1C_S2P_S3P,

    DEP_W2W,
    DEP_P2P,
    DEP_W2P,
    DEP_P2W,
    DEP_W2W_S1C,
    DEP_P2P_S1C,
    DEP_W2P_S1C,
    DEP_P2W_S1C,

    L1A_S1C,
    L2A_S1C,
    L3A_S1C,
    N1A_S1C,
    N2A_S1C,
    L2A_L1A_S1C,
    L3A_L2A_S1C,
    L1A_N1A_S1C,
    N1A_N2A_S1C,
    S1A_S1C,
    S1LeA_S1C,
    S1RiA_S1C,
    S1C_S2A,
    S1C_S2A_S3A,
}

impl FeatureTemplate {
    /// `NAME=a_b[_c...]`
    pub fn render(self, values: &[&str]) -> String {
        format!("{self}={}", values.join("_"))
    }
}

/// Features of a parser configuration over one sentence.
#[derive(Debug, Clone, Copy)]
pub struct CcgFeatures<'s> {
    sentence: &'s Sentence,
    window: usize,
}

impl<'s> CcgFeatures<'s> {
    pub fn new(sentence: &'s Sentence) -> Self {
        Self::with_window(sentence, MAX_WINDOW)
    }

    /// Looks at `window` words on each side and `window` stack items.
    /// Templates reaching further than the window are not emitted.
    pub fn with_window(sentence: &'s Sentence, window: usize) -> Self {
        Self {
            sentence,
            window: window.min(MAX_WINDOW),
        }
    }

    fn offset(read_pos: usize, delta: isize) -> isize {
        read_pos as isize + delta
    }

    fn extra_of(terminal: &Terminal) -> &str {
        terminal.extra.as_deref().unwrap_or(BOUNDARY)
    }

    /// Features of a stack whose top items are `top[0]`, `top[1]`, ...
    pub fn extract(&self, top: &[&DerivationNode], read_pos: usize) -> FeatureSet {
        use FeatureTemplate::*;

        let mut feats = FeatureSet::new();
        let Some(s1) = top.first() else {
            return feats;
        };
        let s2 = top.get(1);
        let s3 = top.get(2);
        let sentence = self.sentence;
        let window = self.window;

        let s1c = s1.category().to_string();
        let s2c = s2.map_or(BOUNDARY.to_string(), |node| node.category().to_string());
        let s3c = s3.map_or(BOUNDARY.to_string(), |node| node.category().to_string());

        let next_word: Vec<&str> = (0..MAX_WINDOW as isize).map(|i| sentence.word(Self::offset(read_pos, i))).collect();
        let last_word: Vec<&str> = (0..MAX_WINDOW as isize).map(|i| sentence.word(Self::offset(read_pos, -1 - i))).collect();
        let next_pos: Vec<&str> = (0..MAX_WINDOW as isize).map(|i| sentence.pos(Self::offset(read_pos, i))).collect();
        let last_pos: Vec<&str> = (0..MAX_WINDOW as isize).map(|i| sentence.pos(Self::offset(read_pos, -1 - i))).collect();

        if window >= 1 {
            feats.put(N1W_S1C.render(&[next_word[0], &s1c]));
            feats.put(L1W_S1C.render(&[last_word[0], &s1c]));
            feats.put(L1W_N1W_S1C.render(&[last_word[0], next_word[0], &s1c]));
            feats.put(N1P_S1C.render(&[next_pos[0], &s1c]));
            feats.put(L1P_S1C.render(&[last_pos[0], &s1c]));
            feats.put(L1P_N1P_S1C.render(&[last_pos[0], next_pos[0], &s1c]));
        }
        if window >= 2 {
            feats.put(N2W_S1C.render(&[next_word[1], &s1c]));
            feats.put(L2W_S1C.render(&[last_word[1], &s1c]));
            feats.put(N1W_N2W_S1C.render(&[next_word[0], next_word[1], &s1c]));
            feats.put(L2W_L1W_S1C.render(&[last_word[1], last_word[0], &s1c]));
            feats.put(N2P_S1C.render(&[next_pos[1], &s1c]));
            feats.put(L2P_S1C.render(&[last_pos[1], &s1c]));
            feats.put(N1P_N2P_S1C.render(&[next_pos[0], next_pos[1], &s1c]));
            feats.put(L2P_L1P_S1C.render(&[last_pos[1], last_pos[0], &s1c]));
        }
        if window >= 3 {
            feats.put(L3W_S1C.render(&[last_word[2], &s1c]));
            feats.put(L3W_L2W_S1C.render(&[last_word[2], last_word[1], &s1c]));
            feats.put(L3P_S1C.render(&[last_pos[2], &s1c]));
            feats.put(L3P_L2P_S1C.render(&[last_pos[2], last_pos[1], &s1c]));
        }

        let head1 = s1.head_terminal();
        let head2 = s2.map(|node| node.head_terminal());
        let head3 = s3.map(|node| node.head_terminal());
        let head_word2 = head2.map_or(BOUNDARY, |t| t.word.as_str());
        let head_pos2 = head2.map_or(BOUNDARY, |t| t.pos.as_str());
        let head_pos3 = head3.map_or(BOUNDARY, |t| t.pos.as_str());

        feats.put(S1W_S1C.render(&[&head1.word, &s1c]));
        feats.put(S1P_S1C.render(&[&head1.pos, &s1c]));

        let leftmost = s1.leftmost_terminal();
        let rightmost = s1.rightmost_terminal();
        if s1.len() > 1 {
            feats.put(S1LeW_S1C.render(&[&leftmost.word, &s1c]));
            feats.put(S1RiW_S1C.render(&[&rightmost.word, &s1c]));
            feats.put(S1LeP_S1C.render(&[&leftmost.pos, &s1c]));
            feats.put(S1RiP_S1C.render(&[&rightmost.pos, &s1c]));
            feats.put(S1LeP_S1RiP_S1C.render(&[&leftmost.pos, &rightmost.pos, &s1c]));
        }

        feats.put(S1W_S2W.render(&[&head1.word, head_word2]));
        feats.put(S1C_S2C.render(&[&s1c, &s2c]));
        feats.put(S1C_S2C_S3C.render(&[&s1c, &s2c, &s3c]));
        feats.put(S1C_S2H.render(&[&s1c, head_word2]));
        feats.put(S1H_S2C.render(&[&head1.word, &s2c]));
        feats.put(S1C_S2P.render(&[&s1c, head_pos2]));
        feats.put(S1C_S2P_S3P.render(&[&s1c, head_pos2, head_pos3]));

        if let Some(head_extra1) = head1.extra.as_deref() {
            let head_extra2 = head2.map_or(BOUNDARY, Self::extra_of);
            let head_extra3 = head3.map_or(BOUNDARY, Self::extra_of);
            let extra_at = |delta: isize| sentence.extra(Self::offset(read_pos, delta)).unwrap_or(BOUNDARY);
            let next: Vec<&str> = (0..MAX_WINDOW as isize).map(extra_at).collect();
            let last: Vec<&str> = (0..MAX_WINDOW as isize).map(|i| extra_at(-1 - i)).collect();

            feats.put(S1A_S1C.render(&[head_extra1, &s1c]));
            feats.put(S1LeA_S1C.render(&[Self::extra_of(leftmost), &s1c]));
            feats.put(S1RiA_S1C.render(&[Self::extra_of(rightmost), &s1c]));
            feats.put(S1C_S2A.render(&[&s1c, head_extra2]));
            feats.put(S1C_S2A_S3A.render(&[&s1c, head_extra2, head_extra3]));

            if window >= 1 {
                feats.put(N1A_S1C.render(&[next[0], &s1c]));
                feats.put(L1A_S1C.render(&[last[0], &s1c]));
                feats.put(L1A_N1A_S1C.render(&[last[0], next[0], &s1c]));
            }
            if window >= 2 {
                feats.put(N2A_S1C.render(&[next[1], &s1c]));
                feats.put(L2A_S1C.render(&[last[1], &s1c]));
                feats.put(N1A_N2A_S1C.render(&[next[0], next[1], &s1c]));
                feats.put(L2A_L1A_S1C.render(&[last[1], last[0], &s1c]));
            }
            if window >= 3 {
                feats.put(L3A_S1C.render(&[last[2], &s1c]));
                feats.put(L3A_L2A_S1C.render(&[last[2], last[1], &s1c]));
            }
        }

        // new dependencies can only appear on the top item
        let start = s1.start();
        for predicate in s1.collect_new_inactive() {
            let pred = s1.terminal_at(predicate);
            for fillers in s1.dependencies()[predicate - start].iter().flatten() {
                for &filler in fillers {
                    let arg = s1.terminal_at(filler);
                    feats.put(DEP_W2W.render(&[&pred.word, &arg.word]));
                    feats.put(DEP_W2P.render(&[&pred.word, &arg.pos]));
                    feats.put(DEP_P2P.render(&[&pred.pos, &arg.pos]));
                    feats.put(DEP_P2W.render(&[&pred.pos, &arg.word]));
                    feats.put(DEP_W2W_S1C.render(&[&pred.word, &arg.word, &s1c]));
                    feats.put(DEP_W2P_S1C.render(&[&pred.word, &arg.pos, &s1c]));
                    feats.put(DEP_P2P_S1C.render(&[&pred.pos, &arg.pos, &s1c]));
                    feats.put(DEP_P2W_S1C.render(&[&pred.pos, &arg.word, &s1c]));
                }
            }
        }
        feats
    }
}

impl FeatureExtractor<ParserState> for CcgFeatures<'_> {
    fn features(&self, state: &ParserState) -> FeatureSet {
        let top: Vec<&DerivationNode> = state.stack().iter().take(self.window()).map(|node| node.as_ref()).collect();
        self.extract(&top, state.read_pos())
    }

    fn window(&self) -> usize {
        self.window.max(1)
    }
}
