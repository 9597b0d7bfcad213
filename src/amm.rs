use crate::error::AmmError;
use crate::token::Token;

/// Which side of a swap is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapKind {
    /// Sell exactly `amount` of the given token to the pool.
    ExactInput,
    /// Buy exactly `amount` of the given token from the pool.
    ExactOutput,
}

/// Outcome of a swap, computed without touching the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SwapQuote {
    pub amount_in: f64,
    pub amount_out: f64,
    pub reserve_base: f64,
    pub reserve_quote: f64,
    /// Relative change of the exchange rate: `new_rate / old_rate - 1`
    pub slippage: f64,
    pub fee_quote: f64,
}

/// Constant-product (x * y = k) pool between a base and a quote token.
#[derive(Debug, Clone)]
pub struct Amm {
    pub base_token: Token,
    pub quote_token: Token,
    pub reserve_base: f64,
    pub reserve_quote: f64,
    pub k: f64,
    pub swap_fee: f64,

    /// Total swap fees collected, denominated in the quote token.
    pub cumulative_fees_quote: f64,
}

impl Amm {
    pub fn new(
        base_token: Token,
        quote_token: Token,
        reserve_base: f64,
        reserve_quote: f64,
    ) -> Result<Self, AmmError> {
        Self::with_fee(base_token, quote_token, reserve_base, reserve_quote, 0.0)
    }

    pub fn with_fee(
        base_token: Token,
        quote_token: Token,
        reserve_base: f64,
        reserve_quote: f64,
        swap_fee: f64,
    ) -> Result<Self, AmmError> {
        if !(reserve_base > 0.0 && reserve_base.is_finite()) {
            return Err(AmmError::NonPositiveAmount(reserve_base));
        }
        if !(reserve_quote > 0.0 && reserve_quote.is_finite()) {
            return Err(AmmError::NonPositiveAmount(reserve_quote));
        }
        if !(0.0..1.0).contains(&swap_fee) {
            return Err(AmmError::InvalidFee(swap_fee));
        }
        Ok(Amm {
            base_token,
            quote_token,
            reserve_base,
            reserve_quote,
            k: reserve_base * reserve_quote,
            swap_fee,
            cumulative_fees_quote: 0.0,
        })
    }

    /// Units of quote token per unit of base token.
    pub fn exchange_rate(&self) -> f64 {
        self.reserve_quote / self.reserve_base
    }

    pub fn invariant(&self) -> f64 {
        self.k
    }

    fn is_base(&self, token: &Token) -> Result<bool, AmmError> {
        if token.same_asset(&self.base_token) {
            Ok(true)
        } else if token.same_asset(&self.quote_token) {
            Ok(false)
        } else {
            Err(AmmError::UnknownToken(token.ticker.clone()))
        }
    }

    /// Compute the pool state after a swap without executing it.
    pub fn quote_swap(
        &self,
        token: &Token,
        amount: f64,
        kind: SwapKind,
    ) -> Result<SwapQuote, AmmError> {
        if !(amount > 0.0) {
            return Err(AmmError::NonPositiveAmount(amount));
        }
        let token_is_base = self.is_base(token)?;

        // Reserves seen from the side of `token`
        let (reserve_token, reserve_other) = if token_is_base {
            (self.reserve_base, self.reserve_quote)
        } else {
            (self.reserve_quote, self.reserve_base)
        };

        let (new_token, new_other, amount_in, amount_out, fee_in) = match kind {
            SwapKind::ExactInput => {
                let effective_input = amount * (1.0 - self.swap_fee);
                let out = reserve_other - self.k / (reserve_token + effective_input);
                (reserve_token + amount, reserve_other - out, amount, out, amount - effective_input)
            }
            SwapKind::ExactOutput => {
                if amount >= reserve_token {
                    return Err(AmmError::InsufficientReserve {
                        token: token.ticker.clone(),
                        requested: amount,
                        reserve: reserve_token,
                    });
                }
                let effective_input = self.k / (reserve_token - amount) - reserve_other;
                let gross_input = effective_input / (1.0 - self.swap_fee);
                (
                    reserve_token - amount,
                    reserve_other + gross_input,
                    gross_input,
                    amount,
                    gross_input - effective_input,
                )
            }
        };

        let (reserve_base, reserve_quote) = if token_is_base {
            (new_token, new_other)
        } else {
            (new_other, new_token)
        };

        // Fee is paid in the input token; value it at the pre-swap rate
        let input_is_base = token_is_base == (kind == SwapKind::ExactInput);
        let fee_quote = if input_is_base {
            fee_in * self.exchange_rate()
        } else {
            fee_in
        };

        let new_rate = reserve_quote / reserve_base;
        Ok(SwapQuote {
            amount_in,
            amount_out,
            reserve_base,
            reserve_quote,
            slippage: new_rate / self.exchange_rate() - 1.0,
            fee_quote,
        })
    }

    fn apply(&mut self, quote: &SwapQuote) {
        self.reserve_base = quote.reserve_base;
        self.reserve_quote = quote.reserve_quote;
        self.cumulative_fees_quote += quote.fee_quote;
        // k only grows through fees that stay in the pool
        self.k = self.reserve_base * self.reserve_quote;
    }

    /// Sell exactly `amount` of `input_token`. Returns the amount received.
    pub fn exact_input_swap(&mut self, input_token: &Token, amount: f64) -> Result<f64, AmmError> {
        let quote = self.quote_swap(input_token, amount, SwapKind::ExactInput)?;
        self.apply(&quote);
        Ok(quote.amount_out)
    }

    /// Buy exactly `amount` of `output_token`. Returns the amount paid.
    pub fn exact_output_swap(
        &mut self,
        output_token: &Token,
        amount: f64,
    ) -> Result<f64, AmmError> {
        let quote = self.quote_swap(output_token, amount, SwapKind::ExactOutput)?;
        self.apply(&quote);
        Ok(quote.amount_in)
    }

    pub fn exact_input_slippage(&self, input_token: &Token, amount: f64) -> Result<f64, AmmError> {
        Ok(self.quote_swap(input_token, amount, SwapKind::ExactInput)?.slippage)
    }

    pub fn exact_output_slippage(
        &self,
        output_token: &Token,
        amount: f64,
    ) -> Result<f64, AmmError> {
        Ok(self.quote_swap(output_token, amount, SwapKind::ExactOutput)?.slippage)
    }

    /// Add liquidity worth `value` quote units, split 50/50 across both reserves.
    ///
    /// For a BTC/USD pool `value` is in USD; for BTC/DOT it is in DOT.
    pub fn add_liquidity(&mut self, value: f64) -> Result<(), AmmError> {
        if !(value > 0.0) {
            return Err(AmmError::NonPositiveAmount(value));
        }
        let rate = self.exchange_rate();
        self.reserve_base += value / 2.0 / rate;
        self.reserve_quote += value / 2.0;
        self.k = self.reserve_base * self.reserve_quote;
        Ok(())
    }

    /// Remove liquidity worth `value` quote units, split 50/50 across both reserves.
    pub fn remove_liquidity(&mut self, value: f64) -> Result<(), AmmError> {
        if !(value > 0.0) {
            return Err(AmmError::NonPositiveAmount(value));
        }
        let available = 2.0 * self.reserve_quote;
        if value >= available {
            return Err(AmmError::InsufficientLiquidity {
                requested: value,
                available,
            });
        }
        let rate = self.exchange_rate();
        self.reserve_base -= value / 2.0 / rate;
        self.reserve_quote -= value / 2.0;
        self.k = self.reserve_base * self.reserve_quote;
        Ok(())
    }
}
