// ============================================================
// Layer 5 — Recurrent Cells
// ============================================================
// One cell type is used by every layer of both the encoder and
// the decoder. All three share the same two projections:
//
//   x_proj = W·x + b        W: [d_in, gates·H]
//   h_proj = U·h            U: [H,    gates·H]
//
// and split the result into `gates` blocks of width H:
//
//   LSTM  (i, f, g, o):  c' = σf⊙c + σi⊙tanh g,  h' = σo⊙tanh c'
//   GRU   (z, r, n):     n  = tanh(x_n + σr⊙h_n), h' = (1-σz)⊙n + σz⊙h
//   tanh  (single):      h' = tanh(x_proj + h_proj)
//
// Sequences are padded, so every state update is blended with
// the previous state through a per-example length mask: rows
// whose sequence has already ended keep their old state and
// emit zeros.
//
// Reference: Hochreiter & Schmidhuber (1997), Cho et al. (2014)

use burn::{
    module::Ignored,
    nn::{DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::sigmoid,
};

use crate::ml::config::RnnCellType;

// ─── CellState ────────────────────────────────────────────────────────────────
/// Recurrent state of one layer for a whole batch.
#[derive(Debug, Clone)]
pub struct CellState<B: Backend> {
    /// [batch, hidden]
    pub hidden: Tensor<B, 2>,
    /// [batch, hidden], LSTM only
    pub cell:   Option<Tensor<B, 2>>,
}

impl<B: Backend> CellState<B> {
    pub fn zeros(batch: usize, hidden: usize, with_cell: bool, device: &B::Device) -> Self {
        Self {
            hidden: Tensor::zeros([batch, hidden], device),
            cell:   with_cell.then(|| Tensor::zeros([batch, hidden], device)),
        }
    }

    /// Take `next` for rows where `active` is 1 and keep `self` where it is 0.
    /// `active` has shape [batch, hidden].
    pub fn blend(self, next: Self, active: Tensor<B, 2>) -> Self {
        let keep = active.clone().neg().add_scalar(1.0);
        let hidden = next.hidden * active.clone() + self.hidden * keep.clone();
        let cell = match (self.cell, next.cell) {
            (Some(old), Some(new)) => Some(new * active + old * keep),
            (_, new)               => new,
        };
        Self { hidden, cell }
    }
}

// ─── RecurrentCell ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct RecurrentCell<B: Backend> {
    pub input_gates:  Linear<B>,
    pub hidden_gates: Linear<B>,
    pub cell_type:    Ignored<RnnCellType>,
    pub d_hidden:     usize,
}

impl<B: Backend> RecurrentCell<B> {
    pub fn new(cell_type: RnnCellType, d_input: usize, d_hidden: usize, device: &B::Device) -> Self {
        let width = cell_type.gates() * d_hidden;
        let init = Initializer::XavierUniform { gain: 1.0 };
        let input_gates = LinearConfig::new(d_input, width)
            .with_initializer(init.clone())
            .init(device);
        let hidden_gates = LinearConfig::new(d_hidden, width)
            .with_bias(false)
            .with_initializer(init)
            .init(device);
        Self { input_gates, hidden_gates, cell_type: Ignored(cell_type), d_hidden }
    }

    pub fn zero_state(&self, batch: usize, device: &B::Device) -> CellState<B> {
        CellState::zeros(batch, self.d_hidden, self.cell_type.0.has_cell_state(), device)
    }

    /// One time step. input: [batch, d_in] → next state.
    pub fn step(&self, input: Tensor<B, 2>, state: &CellState<B>) -> CellState<B> {
        let [batch, _] = input.dims();
        let x = self.input_gates.forward(input);
        let u = self.hidden_gates.forward(state.hidden.clone());

        match self.cell_type.0 {
            RnnCellType::Lstm => {
                let gates = x + u;
                let i = sigmoid(self.gate(&gates, 0, batch));
                let f = sigmoid(self.gate(&gates, 1, batch));
                let g = self.gate(&gates, 2, batch).tanh();
                let o = sigmoid(self.gate(&gates, 3, batch));
                let prev_cell = state
                    .cell
                    .clone()
                    .unwrap_or_else(|| state.hidden.zeros_like());
                let cell = f * prev_cell + i * g;
                let hidden = o * cell.clone().tanh();
                CellState { hidden, cell: Some(cell) }
            }
            RnnCellType::Gru => {
                let z = sigmoid(self.gate(&x, 0, batch) + self.gate(&u, 0, batch));
                let r = sigmoid(self.gate(&x, 1, batch) + self.gate(&u, 1, batch));
                let n = (self.gate(&x, 2, batch) + r * self.gate(&u, 2, batch)).tanh();
                let hidden = z.clone().neg().add_scalar(1.0) * n + z * state.hidden.clone();
                CellState { hidden, cell: None }
            }
            RnnCellType::BasicTanh => CellState { hidden: (x + u).tanh(), cell: None },
        }
    }

    /// Sum of squared gate weights (biases excluded).
    pub fn weight_penalty(&self) -> Tensor<B, 1> {
        self.input_gates.weight.val().powf_scalar(2.0).sum()
            + self.hidden_gates.weight.val().powf_scalar(2.0).sum()
    }

    fn gate(&self, projected: &Tensor<B, 2>, index: usize, batch: usize) -> Tensor<B, 2> {
        let h = self.d_hidden;
        projected.clone().slice([0..batch, index * h..(index + 1) * h])
    }
}

// ─── StackedRnn ───────────────────────────────────────────────────────────────
/// `rnn_layers` cells applied one after another at every time step.
/// Dropout is applied to each layer's output, never to its state.
#[derive(Module, Debug)]
pub struct StackedRnn<B: Backend> {
    pub layers: Vec<RecurrentCell<B>>,
}

pub type RnnState<B> = Vec<CellState<B>>;

impl<B: Backend> StackedRnn<B> {
    pub fn new(
        cell_type: RnnCellType,
        num_layers: usize,
        d_input: usize,
        d_hidden: usize,
        device: &B::Device,
    ) -> Self {
        let layers = (0..num_layers.max(1))
            .map(|layer| {
                let d_in = if layer == 0 { d_input } else { d_hidden };
                RecurrentCell::new(cell_type, d_in, d_hidden, device)
            })
            .collect();
        Self { layers }
    }

    pub fn zero_state(&self, batch: usize, device: &B::Device) -> RnnState<B> {
        self.layers.iter().map(|l| l.zero_state(batch, device)).collect()
    }

    /// Advance every layer by one step. Returns the top layer's output and
    /// the unmasked next state.
    pub fn step(
        &self,
        input: Tensor<B, 2>,
        state: &[CellState<B>],
        keep_prob: f64,
    ) -> (Tensor<B, 2>, RnnState<B>) {
        let mut x = input;
        let mut next_state = Vec::with_capacity(self.layers.len());
        for (layer, prev) in self.layers.iter().zip(state) {
            let next = layer.step(x, prev);
            x = dropout(next.hidden.clone(), keep_prob);
            next_state.push(next);
        }
        (x, next_state)
    }

    /// Run over a padded sequence.
    ///
    /// inputs: [batch, steps, d_in], lengths: [batch]
    /// → (outputs [batch, steps, H] with zeros past each length,
    ///    state after each example's last real step)
    pub fn forward_sequence(
        &self,
        inputs: Tensor<B, 3>,
        lengths: Tensor<B, 1, Int>,
        initial: RnnState<B>,
        keep_prob: f64,
    ) -> (Tensor<B, 3>, RnnState<B>) {
        let [batch, steps, d_in] = inputs.dims();
        let d_hidden = self.hidden_size();

        let mut state = initial;
        let mut outputs = Vec::with_capacity(steps);
        for t in 0..steps {
            let x = inputs.clone().slice([0..batch, t..t + 1, 0..d_in]).reshape([batch, d_in]);
            let active = step_mask(lengths.clone(), t, d_hidden);

            let (out, next) = self.step(x, &state, keep_prob);
            state = state
                .into_iter()
                .zip(next)
                .map(|(old, new)| old.blend(new, active.clone()))
                .collect();
            outputs.push(out * active);
        }

        (Tensor::stack(outputs, 1), state)
    }

    pub fn hidden_size(&self) -> usize {
        self.layers.first().map(|l| l.d_hidden).unwrap_or(0)
    }

    pub fn weight_penalty(&self) -> Tensor<B, 1> {
        self.layers
            .iter()
            .map(RecurrentCell::weight_penalty)
            .reduce(|a, b| a + b)
            .unwrap_or_else(|| Tensor::zeros([1], &self.devices_or_default()))
    }

    fn devices_or_default(&self) -> B::Device {
        self.devices().into_iter().next().unwrap_or_default()
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────
/// [batch, width] float mask: 1 where `t < length`, else 0.
pub fn step_mask<B: Backend>(lengths: Tensor<B, 1, Int>, t: usize, width: usize) -> Tensor<B, 2> {
    let [batch] = lengths.dims();
    lengths
        .greater_elem(t as i64)
        .float()
        .reshape([batch, 1])
        .expand([batch, width])
}

/// Output dropout with a keep-probability; identity at `keep_prob >= 1`
/// and on backends without autodiff.
pub fn dropout<B: Backend, const D: usize>(x: Tensor<B, D>, keep_prob: f64) -> Tensor<B, D> {
    if keep_prob >= 1.0 {
        return x;
    }
    DropoutConfig::new(1.0 - keep_prob).init().forward(x)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    fn to_vec<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_state_shapes_per_cell_type() {
        let device = Default::default();
        for (cell_type, has_cell) in [
            (RnnCellType::Lstm, true),
            (RnnCellType::Gru, false),
            (RnnCellType::BasicTanh, false),
        ] {
            let cell = RecurrentCell::<TestBackend>::new(cell_type, 3, 4, &device);
            let state = cell.zero_state(2, &device);
            let next = cell.step(Tensor::ones([2, 3], &device), &state);
            assert_eq!(next.hidden.dims(), [2, 4]);
            assert_eq!(next.cell.is_some(), has_cell);
        }
    }

    #[test]
    fn test_outputs_are_zero_past_length() {
        let device = Default::default();
        let rnn = StackedRnn::<TestBackend>::new(RnnCellType::Lstm, 2, 3, 4, &device);
        let inputs = Tensor::<TestBackend, 3>::ones([2, 5, 3], &device);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2, 5], &device);

        let (outputs, state) = rnn.forward_sequence(inputs, lengths, rnn.zero_state(2, &device), 1.0);
        assert_eq!(outputs.dims(), [2, 5, 4]);
        assert_eq!(state.len(), 2);

        let padded = to_vec(outputs.clone().slice([0..1, 2..5, 0..4]));
        assert!(padded.iter().all(|&v| v == 0.0));
        let real = to_vec(outputs.slice([1..2, 4..5, 0..4]));
        assert!(real.iter().any(|&v| v != 0.0));
    }

    #[test]
    fn test_final_state_stops_at_length() {
        // A length-2 row fed with 2 real steps must end in the same state
        // whether or not 3 padding steps follow.
        let device = Default::default();
        let rnn = StackedRnn::<TestBackend>::new(RnnCellType::Gru, 1, 3, 4, &device);
        let lengths = Tensor::<TestBackend, 1, Int>::from_ints([2], &device);

        let short = Tensor::<TestBackend, 3>::ones([1, 2, 3], &device);
        let (_, short_state) = rnn.forward_sequence(short, lengths.clone(), rnn.zero_state(1, &device), 1.0);

        let long = Tensor::<TestBackend, 3>::ones([1, 5, 3], &device);
        let (_, long_state) = rnn.forward_sequence(long, lengths, rnn.zero_state(1, &device), 1.0);

        let a = to_vec(short_state[0].hidden.clone());
        let b = to_vec(long_state[0].hidden.clone());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_dropout_hits_output_but_not_state() {
        type AdBackend = Autodiff<NdArray>;
        let device = Default::default();
        let rnn = StackedRnn::<AdBackend>::new(RnnCellType::BasicTanh, 1, 3, 16, &device);
        let input = Tensor::<AdBackend, 2>::ones([4, 3], &device);
        let state = rnn.zero_state(4, &device);

        let (output, next) = rnn.step(input.clone(), &state, 0.5);
        let undropped = rnn.layers[0].step(input, &state[0]).hidden;

        let hidden: Vec<f32> = next[0].hidden.clone().into_data().to_vec::<f32>().unwrap();
        let expected: Vec<f32> = undropped.into_data().to_vec::<f32>().unwrap();
        assert_eq!(hidden, expected);

        let output: Vec<f32> = output.into_data().to_vec::<f32>().unwrap();
        let mut dropped = 0;
        for (o, h) in output.iter().zip(&hidden) {
            if *o == 0.0 {
                dropped += 1;
            } else {
                assert!((o - h * 2.0).abs() < 1e-5, "kept units are scaled by 1/keep_prob");
            }
        }
        assert!(dropped > 0 && dropped < output.len());
    }

    #[test]
    fn test_dropout_is_identity_without_autodiff() {
        let device = Default::default();
        let rnn = StackedRnn::<TestBackend>::new(RnnCellType::BasicTanh, 1, 3, 16, &device);
        let (output, next) = rnn.step(Tensor::ones([4, 3], &device), &rnn.zero_state(4, &device), 0.5);
        assert_eq!(to_vec(output), to_vec(next[0].hidden.clone()));
    }

    #[test]
    fn test_weight_penalty_is_positive() {
        let device = Default::default();
        let rnn = StackedRnn::<TestBackend>::new(RnnCellType::BasicTanh, 1, 3, 4, &device);
        let penalty = rnn.weight_penalty().into_scalar();
        assert!(penalty > 0.0);
    }
}
