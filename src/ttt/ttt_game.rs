use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};

use crate::game::{GameColor, Position};

pub const BOARD_SIZE: usize = 3;
const CELLS_NUM: usize = BOARD_SIZE * BOARD_SIZE;
const FULL_BOARD: u16 = (1 << CELLS_NUM) - 1;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TttMove {
    idx: u8,
}

impl TttMove {
    pub fn new(r: usize, c: usize) -> Self {
        TttMove::from_idx(r * BOARD_SIZE + c)
    }

    pub fn from_idx(idx: usize) -> Self {
        assert!(idx < CELLS_NUM);
        Self { idx: idx as u8 }
    }

    pub fn to_idx(&self) -> usize {
        self.idx as usize
    }

    pub fn row(&self) -> usize {
        self.idx as usize / BOARD_SIZE
    }

    pub fn column(&self) -> usize {
        self.idx as usize % BOARD_SIZE
    }
}

impl Display for TttMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row(), self.column())
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct TttBitboard {
    bitmap: u16,
}

impl TttBitboard {
    pub fn get_raw(&self) -> u16 {
        self.bitmap
    }

    pub fn get(&self, idx: usize) -> bool {
        assert!(idx < CELLS_NUM);
        (self.bitmap & (1u16 << idx)) != 0
    }

    pub fn set(&mut self, idx: usize, val: bool) {
        assert!(idx < CELLS_NUM);
        if val {
            self.bitmap |= 1u16 << idx;
        } else {
            self.bitmap &= !(1u16 << idx);
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct TttPosition {
    board_x: TttBitboard,
    board_o: TttBitboard,
    turn: GameColor,
    winner: Option<GameColor>,
}

impl Default for TttPosition {
    fn default() -> Self {
        Self::new()
    }
}

impl TttPosition {
    pub fn new() -> Self {
        Self {
            board_x: TttBitboard::default(),
            board_o: TttBitboard::default(),
            turn: GameColor::Player1,
            winner: None,
        }
    }

    /// Parse a position from nine board chars ('x', 'o' or '_') followed by the turn char ('x' or 'o').
    ///
    /// Could lead to invalid board, meant for tests and debugging.
    pub fn from_str(s: &str) -> Self {
        assert_eq!(s.chars().count(), CELLS_NUM + 1, "unexpected string length");
        let mut pos = Self::new();
        for (idx, c) in s.chars().enumerate() {
            match idx.cmp(&CELLS_NUM) {
                Ordering::Less => match c {
                    'x' => pos.board_x.set(idx, true),
                    'o' => pos.board_o.set(idx, true),
                    '_' => {}
                    _ => panic!("unknown board char: {:?}", c),
                },
                Ordering::Equal => {
                    pos.turn = match c {
                        'x' => GameColor::Player1,
                        'o' => GameColor::Player2,
                        _ => panic!("unknown turn char: {:?}", c),
                    }
                }
                Ordering::Greater => panic!("too many turn chars: {:?}", c),
            }
        }
        pos.check_winner();
        pos
    }

    pub fn get_tile(&self, r: usize, c: usize) -> Option<GameColor> {
        assert!(r < BOARD_SIZE && c < BOARD_SIZE);
        let idx = r * BOARD_SIZE + c;
        if self.board_x.get(idx) {
            return Some(GameColor::Player1);
        }
        if self.board_o.get(idx) {
            return Some(GameColor::Player2);
        }
        None
    }

    pub fn winner(&self) -> Option<GameColor> {
        self.winner
    }

    pub fn is_valid_move(&self, m: TttMove) -> bool {
        if self.is_over() {
            return false;
        }
        let idx = m.to_idx();
        !self.board_x.get(idx) && !self.board_o.get(idx)
    }

    fn make_move(&mut self, m: TttMove) {
        assert!(self.is_valid_move(m), "illegal move {} in position {}", m, self);

        match self.turn {
            GameColor::Player1 => &mut self.board_x,
            GameColor::Player2 => &mut self.board_o,
        }
        .set(m.to_idx(), true);

        self.turn = self.turn.opposite();
        self.check_winner();
    }

    fn check_winner(&mut self) {
        const WINNING_SEQUENCES: [u16; 8] = [
            0b000000111, // row 1
            0b000111000, // row 2
            0b111000000, // row 3
            0b001001001, // col 1
            0b010010010, // col 2
            0b100100100, // col 3
            0b100010001, // diag 1
            0b001010100, // diag 2
        ];

        for winning_sequence in WINNING_SEQUENCES {
            if (self.board_x.get_raw() & winning_sequence) == winning_sequence {
                self.winner = Some(GameColor::Player1);
                return;
            }
            if (self.board_o.get_raw() & winning_sequence) == winning_sequence {
                self.winner = Some(GameColor::Player2);
                return;
            }
        }
        self.winner = None;
    }
}

impl Position for TttPosition {
    type Move = TttMove;

    fn turn(&self) -> GameColor {
        self.turn
    }

    fn legal_moves(&self) -> Vec<TttMove> {
        if self.is_over() {
            return Vec::new();
        }
        (0..CELLS_NUM)
            .map(TttMove::from_idx)
            .filter(|m| self.is_valid_move(*m))
            .collect()
    }

    fn moved_position(&self, m: TttMove) -> Self {
        let mut res = *self;
        res.make_move(m);
        res
    }

    fn is_over(&self) -> bool {
        self.winner.is_some() || (self.board_x.get_raw() | self.board_o.get_raw()) == FULL_BOARD
    }

    fn score(&self) -> f32 {
        GameColor::to_signed_one(self.winner) as f32
    }
}

impl Display for TttPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..BOARD_SIZE {
            for c in 0..BOARD_SIZE {
                let tile = match self.get_tile(r, c) {
                    Some(GameColor::Player1) => 'x',
                    Some(GameColor::Player2) => 'o',
                    None => '_',
                };
                write!(f, "{}", tile)?;
            }
        }
        let turn = match self.turn {
            GameColor::Player1 => 'x',
            GameColor::Player2 => 'o',
        };
        write!(f, "{}", turn)
    }
}

impl Debug for TttPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TttPosition({})", self)
    }
}
