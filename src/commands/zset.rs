//! Sorted set commands (ZADD, ZREM, ZSCORE, ZCARD, ZRANK, ZREVRANK, ZRANGE,
//! ZREVRANGE, ZRANGEBYSCORE, ZCOUNT, ZINCRBY)

use super::{
    eq_ignore_case, parse_float, parse_int, Command, CommandContext, CommandError, CommandFlags,
    CommandResult,
};
use crate::protocol::RespValue;
use crate::store::{format_score, ScoreBound, ZAddFlags};
use bytes::Bytes;

const WRITE_DENY_OOM: CommandFlags = CommandFlags::WRITE.union(CommandFlags::DENY_OOM);

fn parse_bound(raw: &[u8]) -> Result<ScoreBound, CommandError> {
    ScoreBound::parse(raw).ok_or(CommandError::InvalidScoreRange)
}

/// Flatten `(member, score)` pairs into a reply
fn scored_reply(items: Vec<(Bytes, f64)>, with_scores: bool) -> RespValue {
    if with_scores {
        RespValue::bulk_array(
            items
                .into_iter()
                .flat_map(|(member, score)| [member, format_score(score)]),
        )
    } else {
        RespValue::bulk_array(items.into_iter().map(|(member, _)| member))
    }
}

/// ZADD command - Add members with scores, or update their scores
///
/// Syntax: ZADD key [NX | XX] [CH] [INCR] score member [score member ...]
pub struct ZAddCommand;

impl Command for ZAddCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let mut flags = ZAddFlags::default();
        let mut changed = false;

        let mut i = 1;
        while i < args.len() {
            let opt = &args[i];
            if eq_ignore_case(opt, "NX") {
                flags.nx = true;
            } else if eq_ignore_case(opt, "XX") {
                flags.xx = true;
            } else if eq_ignore_case(opt, "CH") {
                changed = true;
            } else if eq_ignore_case(opt, "INCR") {
                flags.incr = true;
            } else {
                break;
            }
            i += 1;
        }

        let rest = &args[i..];
        if rest.is_empty() || rest.len() % 2 != 0 {
            return Err(CommandError::Syntax);
        }
        if flags.nx && flags.xx {
            return Err(CommandError::Other(
                "XX and NX options at the same time are not compatible".to_string(),
            ));
        }
        if flags.incr && rest.len() != 2 {
            return Err(CommandError::Other(
                "INCR option supports a single increment-element pair".to_string(),
            ));
        }

        let items = rest
            .chunks_exact(2)
            .map(|pair| Ok((parse_float(&pair[0])?, pair[1].clone())))
            .collect::<Result<Vec<_>, CommandError>>()?;

        let outcome = ctx.keyspace()?.zadd(&args[0], flags, &items)?;
        if flags.incr {
            return Ok(RespValue::optional_bulk(outcome.score.map(format_score)));
        }
        let count = if changed { outcome.added + outcome.updated } else { outcome.added };
        Ok(RespValue::integer(count as i64))
    }

    fn name(&self) -> &'static str {
        "ZADD"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// ZINCRBY command - Increment the score of a member
///
/// Syntax: ZINCRBY key increment member
pub struct ZIncrByCommand;

impl Command for ZIncrByCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let increment = parse_float(&args[1])?;
        let score = ctx.keyspace()?.zincr_by(&args[0], increment, &args[2])?;
        Ok(RespValue::bulk_string(format_score(score)))
    }

    fn name(&self) -> &'static str {
        "ZINCRBY"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn flags(&self) -> CommandFlags {
        WRITE_DENY_OOM
    }
}

/// ZREM command - Remove members
///
/// Syntax: ZREM key member [member ...]
pub struct ZRemCommand;

impl Command for ZRemCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let removed = ctx.keyspace()?.zrem(&args[0], &args[1..])?;
        Ok(RespValue::integer(removed as i64))
    }

    fn name(&self) -> &'static str {
        "ZREM"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
    }
}

/// ZSCORE command - Score of a member
///
/// Syntax: ZSCORE key member
pub struct ZScoreCommand;

impl Command for ZScoreCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let score = ctx.keyspace()?.zscore(&args[0], &args[1])?;
        Ok(RespValue::optional_bulk(score.map(format_score)))
    }

    fn name(&self) -> &'static str {
        "ZSCORE"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// ZCARD command - Number of members
///
/// Syntax: ZCARD key
pub struct ZCardCommand;

impl Command for ZCardCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let card = ctx.keyspace()?.zcard(&args[0])?;
        Ok(RespValue::integer(card as i64))
    }

    fn name(&self) -> &'static str {
        "ZCARD"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// ZRANK / ZREVRANK - Position of a member
///
/// Syntax: ZRANK key member
pub struct ZRankCommand {
    name: &'static str,
    reverse: bool,
}

impl ZRankCommand {
    pub const ZRANK: ZRankCommand = ZRankCommand { name: "ZRANK", reverse: false };
    pub const ZREVRANK: ZRankCommand = ZRankCommand { name: "ZREVRANK", reverse: true };
}

impl Command for ZRankCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let rank = ctx.keyspace()?.zrank(&args[0], &args[1], self.reverse)?;
        Ok(match rank {
            Some(rank) => RespValue::integer(rank as i64),
            None => RespValue::null(),
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// ZRANGE / ZREVRANGE - Members between two ranks
///
/// Syntax: ZRANGE key start stop [WITHSCORES]
pub struct ZRangeCommand {
    name: &'static str,
    reverse: bool,
}

impl ZRangeCommand {
    pub const ZRANGE: ZRangeCommand = ZRangeCommand { name: "ZRANGE", reverse: false };
    pub const ZREVRANGE: ZRangeCommand = ZRangeCommand { name: "ZREVRANGE", reverse: true };
}

impl Command for ZRangeCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let start = parse_int(&args[1])?;
        let stop = parse_int(&args[2])?;
        let with_scores = match args.get(3) {
            Some(opt) if eq_ignore_case(opt, "WITHSCORES") => true,
            Some(_) => return Err(CommandError::Syntax),
            None => false,
        };
        let items = ctx.keyspace()?.zrange(&args[0], start, stop, self.reverse)?;
        Ok(scored_reply(items, with_scores))
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(4)
    }
}

/// ZRANGEBYSCORE command - Members within a score range
///
/// Syntax: ZRANGEBYSCORE key min max [WITHSCORES] [LIMIT offset count]
///
/// Bounds are inclusive unless prefixed with `(`; `-inf` and `+inf` are
/// accepted. A negative count returns everything after the offset.
pub struct ZRangeByScoreCommand;

impl Command for ZRangeByScoreCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let min = parse_bound(&args[1])?;
        let max = parse_bound(&args[2])?;

        let mut with_scores = false;
        let mut offset = 0usize;
        let mut limit = None;
        let mut i = 3;
        while i < args.len() {
            if eq_ignore_case(&args[i], "WITHSCORES") {
                with_scores = true;
                i += 1;
            } else if eq_ignore_case(&args[i], "LIMIT") && i + 2 < args.len() {
                let start = parse_int(&args[i + 1])?;
                let count = parse_int(&args[i + 2])?;
                if start < 0 {
                    return Ok(RespValue::array(Vec::new()));
                }
                offset = start as usize;
                limit = usize::try_from(count).ok();
                i += 3;
            } else {
                return Err(CommandError::Syntax);
            }
        }

        let items = ctx
            .keyspace()?
            .zrange_by_score(&args[0], min, max, offset, limit)?;
        Ok(scored_reply(items, with_scores))
    }

    fn name(&self) -> &'static str {
        "ZRANGEBYSCORE"
    }

    fn min_args(&self) -> usize {
        3
    }
}

/// ZCOUNT command - Number of members within a score range
///
/// Syntax: ZCOUNT key min max
pub struct ZCountCommand;

impl Command for ZCountCommand {
    fn execute(&self, ctx: &mut CommandContext<'_>, args: &[Bytes]) -> CommandResult {
        let min = parse_bound(&args[1])?;
        let max = parse_bound(&args[2])?;
        let count = ctx.keyspace()?.zcount(&args[0], min, max)?;
        Ok(RespValue::integer(count as i64))
    }

    fn name(&self) -> &'static str {
        "ZCOUNT"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
}
